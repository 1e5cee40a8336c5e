//! Peer side of the handshake
//!
//! Mirror image of [`AuthGate`](crate::AuthGate) for the party that connects
//! to a device: it answers the challenge, then runs its own pair of
//! keystreams.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use rand::RngCore;

use crate::cipher::{ChallengeCipher, KeyStreamCipher};
use crate::handshake::{CHALLENGE_LEN, IV_LEN};
use crate::{ChannelError, ChannelMode};

/// Result of feeding received bytes to a [`PeerChannel`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerOutput {
    /// Bytes to write back to the device (the challenge response)
    pub send: Option<Bytes>,
    /// Device output, deciphered
    pub deliver: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerState {
    AwaitingChallenge,
    Ready,
}

/// Connecting side of an ecmd channel
#[derive(Debug)]
pub struct PeerChannel {
    state: PeerState,
    mode: ChannelMode,
    cipher: Arc<ChallengeCipher>,
    challenge: BytesMut,
    inbound: KeyStreamCipher,
    outbound: KeyStreamCipher,
}

impl PeerChannel {
    pub fn new(mode: ChannelMode, cipher: Arc<ChallengeCipher>) -> Self {
        let state = if mode.authenticate {
            PeerState::AwaitingChallenge
        } else {
            PeerState::Ready
        };

        Self {
            state,
            mode,
            cipher,
            challenge: BytesMut::with_capacity(CHALLENGE_LEN),
            inbound: KeyStreamCipher::new(),
            outbound: KeyStreamCipher::new(),
        }
    }

    /// Whether the challenge has been answered and commands may be sent
    pub fn is_ready(&self) -> bool {
        self.state == PeerState::Ready
    }

    /// Feed bytes received from the device
    ///
    /// The challenge may arrive in pieces; it is answered as soon as all
    /// [`CHALLENGE_LEN`] bytes are in.
    pub fn receive(&mut self, bytes: &[u8]) -> PeerOutput {
        let mut output = PeerOutput::default();
        let mut rest = bytes;

        if self.state == PeerState::AwaitingChallenge {
            let take = (CHALLENGE_LEN - self.challenge.len()).min(rest.len());
            self.challenge.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            let Ok(challenge) = <[u8; CHALLENGE_LEN]>::try_from(&self.challenge[..]) else {
                return output;
            };

            output.send = Some(Bytes::copy_from_slice(&self.cipher.respond(&challenge)));
            self.state = PeerState::Ready;
        }

        if !rest.is_empty() {
            output.deliver = if self.mode.encrypt {
                self.inbound.absorb(rest).freeze()
            } else {
                Bytes::copy_from_slice(rest)
            };
        }

        output
    }

    /// Prepare a command for the device, prepending the IV on first use
    pub fn seal<R: RngCore + ?Sized>(
        &mut self,
        payload: &[u8],
        rng: &mut R,
    ) -> Result<Bytes, ChannelError> {
        if !self.is_ready() {
            return Err(ChannelError::NotAuthenticated);
        }
        if !self.mode.encrypt {
            return Ok(Bytes::copy_from_slice(payload));
        }

        let mut out = BytesMut::with_capacity(IV_LEN + payload.len());
        if !self.outbound.is_initialized() {
            let mut iv = [0u8; IV_LEN];
            rng.fill_bytes(&mut iv);
            self.outbound.bootstrap(&iv);
            out.extend_from_slice(&iv);
        }

        let start = out.len();
        out.extend_from_slice(payload);
        self.outbound.apply(&mut out[start..])?;
        Ok(out.freeze())
    }
}
