//! ecmd shared channel types
//!
//! This crate provides the pieces both ends of an ecmd connection need:
//! the challenge and keystream ciphers, the device-side authentication gate,
//! the peer-side handshake and the line/response codecs.
//!
//! Everything here is pure logic. State machines take bytes and a random
//! source and hand back actions; sockets live in the binaries.

pub mod auth_gate;
pub mod cipher;
pub mod codec;
pub mod peer;

use thiserror::Error;

pub use auth_gate::{AuthGate, AuthState, GateAction, GateEvent};
pub use cipher::{ChallengeCipher, KeyStreamCipher, SharedKey};
pub use codec::{HandlerError, HandlerOutcome, LineDecoder, ResponseCode};
pub use peer::{PeerChannel, PeerOutput};

/// Handshake wire parameters
pub mod handshake {
    /// Length of the device challenge and of the peer's response
    pub const CHALLENGE_LEN: usize = 8;

    /// Length of the in-band IV that bootstraps each keystream direction
    pub const IV_LEN: usize = 8;

    /// Default TCP port of the ecmd service
    pub const DEFAULT_PORT: u16 = 2701;
}

/// Which protections a channel applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMode {
    /// Require the challenge/response exchange before any application data
    pub authenticate: bool,
    /// Run both directions through a keystream cipher
    pub encrypt: bool,
}

impl Default for ChannelMode {
    fn default() -> Self {
        Self {
            authenticate: true,
            encrypt: true,
        }
    }
}

impl ChannelMode {
    /// Plain channel: no handshake, no encryption
    pub fn plain() -> Self {
        Self {
            authenticate: false,
            encrypt: false,
        }
    }
}

/// Channel-level failures
///
/// `AuthFailure` and `DesyncRisk` are fatal for the connection that raised
/// them; the remaining variants report misuse of a channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    AuthFailure(&'static str),

    #[error("Retransmission requested after the outbound keystream started")]
    DesyncRisk,

    #[error("Channel is not authenticated yet")]
    NotAuthenticated,

    #[error("Channel was aborted")]
    Aborted,

    #[error("Keystream used before its IV was seen")]
    KeystreamNotReady,

    #[error("Invalid key length: {actual} bytes (expected {expected})")]
    InvalidKeyLength { expected: usize, actual: usize },
}
