//! Authentication gate
//!
//! Sits between the transport and the application of one connection and
//! decides which bytes may pass.
//!
//! ```text
//!  ┌─────┐ connect  ┌───────────────┐ response ok ┌───────────────┐
//!  │ New │─────────>│ ChallengeSent │────────────>│ Authenticated │
//!  └─────┘          └───────────────┘             └───────────────┘
//!     │ early data         │ short / wrong response       │ retransmit after
//!     ↓                    ↓                              ↓ keystream start
//!  ┌─────────────────────────────────────────────────────────┐
//!  │                        Aborted                          │
//!  └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The gate performs no I/O. The driver feeds it [`GateEvent`]s and executes
//! the returned [`GateAction`]s: send bytes, hand bytes to the application,
//! or abort the transport. Outbound application bytes go through
//! [`AuthGate::seal`].

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use rand::RngCore;

use crate::cipher::{ChallengeCipher, KeyStreamCipher};
use crate::handshake::{CHALLENGE_LEN, IV_LEN};
use crate::{ChannelError, ChannelMode};

/// Authentication state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Transport connected, nothing sent yet
    New,
    /// Challenge sent, waiting for the peer's response
    ChallengeSent,
    /// Response verified, application traffic flows
    Authenticated,
    /// Terminal; nothing is accepted or emitted any more
    Aborted,
}

/// Transport events for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent<'a> {
    /// Transport connection established
    Connect,
    /// Bytes received from the peer, in order
    Data(&'a [u8]),
    /// The transport wants the last segment sent again
    Retransmit,
    /// Transport connection closed by the peer
    Close,
}

/// What the driver has to do after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    /// Write these bytes to the transport as they are
    Send(Bytes),
    /// The application may start talking; emitted once per connection
    Ready,
    /// Application bytes, deciphered, in order
    Deliver(Bytes),
    /// Abort the transport; the gate is now [`AuthState::Aborted`]
    Abort(ChannelError),
}

/// Per-connection challenge/response and keystream state
#[derive(Debug)]
pub struct AuthGate {
    state: AuthState,
    mode: ChannelMode,
    cipher: Arc<ChallengeCipher>,
    challenge: [u8; CHALLENGE_LEN],
    inbound: KeyStreamCipher,
    outbound: KeyStreamCipher,
}

impl AuthGate {
    /// Create a gate in [`AuthState::New`]
    pub fn new(mode: ChannelMode, cipher: Arc<ChallengeCipher>) -> Self {
        Self {
            state: AuthState::New,
            mode,
            cipher,
            challenge: [0; CHALLENGE_LEN],
            inbound: KeyStreamCipher::new(),
            outbound: KeyStreamCipher::new(),
        }
    }

    /// Get current state
    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Whether the outbound keystream has started (no retransmits allowed)
    pub fn outbound_initialized(&self) -> bool {
        self.outbound.is_initialized()
    }

    /// Process a transport event and return the actions to execute
    pub fn handle<R: RngCore + ?Sized>(
        &mut self,
        event: GateEvent<'_>,
        rng: &mut R,
    ) -> Vec<GateAction> {
        if self.state == AuthState::Aborted {
            return Vec::new();
        }

        match event {
            GateEvent::Connect => self.on_connect(rng),
            GateEvent::Retransmit => self.on_retransmit(),
            GateEvent::Data(bytes) => self.on_data(bytes),
            GateEvent::Close => Vec::new(),
        }
    }

    /// Prepare application bytes for the transport
    ///
    /// The first call on an encrypted channel prepends a fresh IV and starts
    /// the outbound keystream.
    pub fn seal<R: RngCore + ?Sized>(
        &mut self,
        payload: &[u8],
        rng: &mut R,
    ) -> Result<Bytes, ChannelError> {
        match self.state {
            AuthState::Authenticated => {}
            AuthState::Aborted => return Err(ChannelError::Aborted),
            AuthState::New | AuthState::ChallengeSent => {
                return Err(ChannelError::NotAuthenticated)
            }
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

    fn on_connect<R: RngCore + ?Sized>(&mut self, rng: &mut R) -> Vec<GateAction> {
        if self.state != AuthState::New {
            return Vec::new();
        }

        if !self.mode.authenticate {
            self.state = AuthState::Authenticated;
            return vec![GateAction::Ready];
        }

        rng.fill_bytes(&mut self.challenge);
        self.state = AuthState::ChallengeSent;
        vec![GateAction::Send(Bytes::copy_from_slice(&self.challenge))]
    }

    fn on_retransmit(&mut self) -> Vec<GateAction> {
        // A keystream cannot be rewound; resending enciphered bytes would
        // desynchronise the peer.
        if self.outbound.is_initialized() {
            return self.abort(ChannelError::DesyncRisk);
        }

        match self.state {
            AuthState::ChallengeSent => {
                vec![GateAction::Send(Bytes::copy_from_slice(&self.challenge))]
            }
            _ => Vec::new(),
        }
    }

    fn on_data(&mut self, bytes: &[u8]) -> Vec<GateAction> {
        match self.state {
            AuthState::New => self.abort(ChannelError::AuthFailure("data before challenge")),
            AuthState::ChallengeSent => self.verify_response(bytes),
            AuthState::Authenticated => self.pass_inbound(bytes).into_iter().collect(),
            AuthState::Aborted => Vec::new(),
        }
    }

    fn verify_response(&mut self, bytes: &[u8]) -> Vec<GateAction> {
        if bytes.len() < CHALLENGE_LEN {
            return self.abort(ChannelError::AuthFailure("short response"));
        }

        let expected = self.cipher.respond(&self.challenge);
        let (response, rest) = bytes.split_at(CHALLENGE_LEN);
        if !constant_time_eq(&expected, response) {
            return self.abort(ChannelError::AuthFailure("response mismatch"));
        }

        self.state = AuthState::Authenticated;

        let mut actions = vec![GateAction::Ready];
        actions.extend(self.pass_inbound(rest));
        actions
    }

    fn pass_inbound(&mut self, bytes: &[u8]) -> Option<GateAction> {
        if bytes.is_empty() {
            return None;
        }

        let plain = if self.mode.encrypt {
            self.inbound.absorb(bytes)
        } else {
            BytesMut::from(bytes)
        };

        if plain.is_empty() {
            None
        } else {
            Some(GateAction::Deliver(plain.freeze()))
        }
    }

    fn abort(&mut self, reason: ChannelError) -> Vec<GateAction> {
        self.state = AuthState::Aborted;
        vec![GateAction::Abort(reason)]
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::SharedKey;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gate(mode: ChannelMode) -> (AuthGate, Arc<ChallengeCipher>) {
        let cipher = Arc::new(ChallengeCipher::new(&SharedKey::default()).unwrap());
        (AuthGate::new(mode, cipher.clone()), cipher)
    }

    fn sent_challenge(actions: &[GateAction]) -> [u8; CHALLENGE_LEN] {
        match actions {
            [GateAction::Send(bytes)] => bytes[..].try_into().unwrap(),
            other => panic!("expected a single Send, got {:?}", other),
        }
    }

    #[test]
    fn test_initial_state() {
        let (gate, _) = gate(ChannelMode::default());
        assert_eq!(gate.state(), AuthState::New);
        assert!(!gate.outbound_initialized());
    }

    #[test]
    fn test_connect_sends_challenge() {
        let mut rng = StdRng::seed_from_u64(1);
        let (mut gate, _) = gate(ChannelMode::default());

        let actions = gate.handle(GateEvent::Connect, &mut rng);
        assert_eq!(gate.state(), AuthState::ChallengeSent);
        assert_eq!(sent_challenge(&actions).len(), CHALLENGE_LEN);
    }

    #[test]
    fn test_retransmit_resends_same_challenge() {
        let mut rng = StdRng::seed_from_u64(2);
        let (mut gate, _) = gate(ChannelMode::default());

        let first = sent_challenge(&gate.handle(GateEvent::Connect, &mut rng));
        let again = sent_challenge(&gate.handle(GateEvent::Retransmit, &mut rng));
        assert_eq!(first, again);
        assert_eq!(gate.state(), AuthState::ChallengeSent);
    }

    #[test]
    fn test_valid_response_authenticates() {
        let mut rng = StdRng::seed_from_u64(3);
        let (mut gate, cipher) = gate(ChannelMode {
            authenticate: true,
            encrypt: false,
        });

        let challenge = sent_challenge(&gate.handle(GateEvent::Connect, &mut rng));
        let mut segment = cipher.respond(&challenge).to_vec();
        segment.extend_from_slice(b"show ip\n");

        let actions = gate.handle(GateEvent::Data(&segment), &mut rng);
        assert_eq!(gate.state(), AuthState::Authenticated);
        assert_eq!(
            actions,
            vec![
                GateAction::Ready,
                GateAction::Deliver(Bytes::from_static(b"show ip\n"))
            ]
        );
    }

    #[test]
    fn test_ready_is_reported_once() {
        let mut rng = StdRng::seed_from_u64(4);
        let (mut gate, cipher) = gate(ChannelMode {
            authenticate: true,
            encrypt: false,
        });

        let challenge = sent_challenge(&gate.handle(GateEvent::Connect, &mut rng));
        gate.handle(GateEvent::Data(&cipher.respond(&challenge)), &mut rng);

        let actions = gate.handle(GateEvent::Data(b"reset\n"), &mut rng);
        assert!(!actions.contains(&GateAction::Ready));
        assert!(gate.handle(GateEvent::Connect, &mut rng).is_empty());
    }

    #[test]
    fn test_wrong_response_aborts() {
        let mut rng = StdRng::seed_from_u64(5);
        let (mut gate, _) = gate(ChannelMode::default());
        gate.handle(GateEvent::Connect, &mut rng);

        let actions = gate.handle(GateEvent::Data(&[0u8; 8]), &mut rng);
        assert_eq!(
            actions,
            vec![GateAction::Abort(ChannelError::AuthFailure("response mismatch"))]
        );
        assert_eq!(gate.state(), AuthState::Aborted);
    }

    #[test]
    fn test_short_response_aborts() {
        let mut rng = StdRng::seed_from_u64(6);
        let (mut gate, _) = gate(ChannelMode::default());
        gate.handle(GateEvent::Connect, &mut rng);

        let actions = gate.handle(GateEvent::Data(&[1, 2, 3]), &mut rng);
        assert!(matches!(
            actions.as_slice(),
            [GateAction::Abort(ChannelError::AuthFailure(_))]
        ));
    }

    #[test]
    fn test_data_before_challenge_aborts() {
        let mut rng = StdRng::seed_from_u64(7);
        let (mut gate, _) = gate(ChannelMode::default());
        let actions = gate.handle(GateEvent::Data(b"hello"), &mut rng);
        assert!(matches!(actions.as_slice(), [GateAction::Abort(_)]));
    }

    #[test]
    fn test_aborted_is_terminal() {
        let mut rng = StdRng::seed_from_u64(8);
        let (mut gate, _) = gate(ChannelMode::default());
        gate.handle(GateEvent::Connect, &mut rng);
        gate.handle(GateEvent::Data(&[0u8; 8]), &mut rng);

        assert!(gate.handle(GateEvent::Data(b"show mac\n"), &mut rng).is_empty());
        assert!(gate.handle(GateEvent::Retransmit, &mut rng).is_empty());
        assert_eq!(gate.seal(b"OK", &mut rng), Err(ChannelError::Aborted));
    }

    #[test]
    fn test_seal_before_authentication_fails() {
        let mut rng = StdRng::seed_from_u64(9);
        let (mut gate, _) = gate(ChannelMode::default());
        gate.handle(GateEvent::Connect, &mut rng);
        assert_eq!(
            gate.seal(b"OK", &mut rng),
            Err(ChannelError::NotAuthenticated)
        );
    }

    #[test]
    fn test_first_seal_prepends_iv() {
        let mut rng = StdRng::seed_from_u64(10);
        let (mut gate, cipher) = gate(ChannelMode::default());
        let challenge = sent_challenge(&gate.handle(GateEvent::Connect, &mut rng));
        gate.handle(GateEvent::Data(&cipher.respond(&challenge)), &mut rng);

        let first = gate.seal(b"OK\n", &mut rng).unwrap();
        assert_eq!(first.len(), IV_LEN + 3);
        assert!(gate.outbound_initialized());

        let second = gate.seal(b"OK\n", &mut rng).unwrap();
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn test_retransmit_after_keystream_start_aborts() {
        let mut rng = StdRng::seed_from_u64(11);
        let (mut gate, cipher) = gate(ChannelMode::default());
        let challenge = sent_challenge(&gate.handle(GateEvent::Connect, &mut rng));
        gate.handle(GateEvent::Data(&cipher.respond(&challenge)), &mut rng);
        gate.seal(b"OK\n", &mut rng).unwrap();

        let actions = gate.handle(GateEvent::Retransmit, &mut rng);
        assert_eq!(actions, vec![GateAction::Abort(ChannelError::DesyncRisk)]);
        assert_eq!(gate.state(), AuthState::Aborted);
    }

    #[test]
    fn test_retransmit_before_any_output_is_ignored() {
        let mut rng = StdRng::seed_from_u64(12);
        let (mut gate, cipher) = gate(ChannelMode::default());
        let challenge = sent_challenge(&gate.handle(GateEvent::Connect, &mut rng));
        gate.handle(GateEvent::Data(&cipher.respond(&challenge)), &mut rng);

        assert!(gate.handle(GateEvent::Retransmit, &mut rng).is_empty());
        assert_eq!(gate.state(), AuthState::Authenticated);
    }

    #[test]
    fn test_plain_mode_is_ready_on_connect() {
        let mut rng = StdRng::seed_from_u64(13);
        let (mut gate, _) = gate(ChannelMode::plain());

        assert_eq!(
            gate.handle(GateEvent::Connect, &mut rng),
            vec![GateAction::Ready]
        );
        assert_eq!(
            gate.handle(GateEvent::Data(b"show ip\n"), &mut rng),
            vec![GateAction::Deliver(Bytes::from_static(b"show ip\n"))]
        );
        assert_eq!(&gate.seal(b"OK\n", &mut rng).unwrap()[..], b"OK\n");
    }
}
