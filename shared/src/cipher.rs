//! Channel ciphers
//!
//! Two primitives protect a connection:
//!
//! - the challenge cipher, a 64-bit block cipher keyed with the shared secret,
//!   proves the peer knows the key during the handshake;
//! - the keystream cipher encrypts application bytes. Each direction has its
//!   own instance, seeded by an 8-byte IV that travels in-band in front of the
//!   first enciphered byte.
//!
//! The block cipher variant is picked at build time: `cast5` (128-bit key,
//! default) or `blowfish` (80-bit key).

use bytes::BytesMut;
use rc4::{consts::U8, KeyInit, Rc4, StreamCipher};

use crate::handshake::{CHALLENGE_LEN, IV_LEN};
use crate::ChannelError;

#[cfg(not(any(feature = "cast5", feature = "blowfish")))]
compile_error!("ecmd-shared needs a challenge cipher: enable feature `cast5` or `blowfish`");

#[cfg(feature = "cast5")]
mod variant {
    use cast5::cipher::{Block, BlockEncrypt, KeyInit};
    use cast5::Cast5;

    use crate::ChannelError;

    pub const NAME: &str = "cast5";
    pub const KEY_LEN: usize = 16;
    pub const DEFAULT_KEY: &[u8; KEY_LEN] = b"ABCDEF23ABCDEF23";

    pub struct Engine(Cast5);

    impl Engine {
        pub fn new(key: &[u8; KEY_LEN]) -> Result<Self, ChannelError> {
            Ok(Self(Cast5::new(key.into())))
        }

        pub fn encrypt(&self, block: &mut [u8; 8]) {
            self.0.encrypt_block(Block::<Cast5>::from_mut_slice(block));
        }
    }
}

#[cfg(all(feature = "blowfish", not(feature = "cast5")))]
mod variant {
    use blowfish::cipher::{Block, BlockEncrypt, KeyInit};
    use blowfish::Blowfish;

    use crate::ChannelError;

    pub const NAME: &str = "blowfish-80";
    pub const KEY_LEN: usize = 10;
    pub const DEFAULT_KEY: &[u8; KEY_LEN] = b"ABCDEF2342";

    pub struct Engine(Blowfish);

    impl Engine {
        pub fn new(key: &[u8; KEY_LEN]) -> Result<Self, ChannelError> {
            let cipher: Blowfish =
                Blowfish::new_from_slice(key).map_err(|_| ChannelError::InvalidKeyLength {
                    expected: KEY_LEN,
                    actual: key.len(),
                })?;
            Ok(Self(cipher))
        }

        pub fn encrypt(&self, block: &mut [u8; 8]) {
            self.0.encrypt_block(Block::<Blowfish>::from_mut_slice(block));
        }
    }
}

/// Key length of the configured challenge cipher
pub const KEY_LEN: usize = variant::KEY_LEN;

/// The pre-shared secret both ends use for the challenge exchange
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; KEY_LEN]);

impl SharedKey {
    /// Build a key from raw bytes, which must match the variant's key length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ChannelError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| ChannelError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Default for SharedKey {
    fn default() -> Self {
        Self(*variant::DEFAULT_KEY)
    }
}

// Never print key material.
impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedKey({} bytes)", KEY_LEN)
    }
}

/// Block cipher used to answer a challenge
pub struct ChallengeCipher {
    engine: variant::Engine,
}

impl ChallengeCipher {
    /// Name of the variant compiled in
    pub const VARIANT: &'static str = variant::NAME;

    pub fn new(key: &SharedKey) -> Result<Self, ChannelError> {
        Ok(Self {
            engine: variant::Engine::new(key.as_bytes())?,
        })
    }

    /// `encrypt_block(shared_key, challenge)`
    pub fn respond(&self, challenge: &[u8; CHALLENGE_LEN]) -> [u8; CHALLENGE_LEN] {
        let mut block = *challenge;
        self.engine.encrypt(&mut block);
        block
    }
}

impl std::fmt::Debug for ChallengeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeCipher")
            .field("variant", &Self::VARIANT)
            .finish()
    }
}

/// One direction of the keystream cipher
///
/// The first [`IV_LEN`] bytes seen in a direction are the IV. After that
/// every byte consumes exactly one keystream symbol, so bytes must be fed in
/// transport order and never twice.
pub struct KeyStreamCipher {
    iv: [u8; IV_LEN],
    iv_filled: usize,
    stream: Option<Rc4<U8>>,
}

impl KeyStreamCipher {
    pub fn new() -> Self {
        Self {
            iv: [0; IV_LEN],
            iv_filled: 0,
            stream: None,
        }
    }

    /// Whether the IV has been seen and the keystream is running
    pub fn is_initialized(&self) -> bool {
        self.stream.is_some()
    }

    /// Seed the keystream from a locally generated IV (sending side)
    pub fn bootstrap(&mut self, iv: &[u8; IV_LEN]) {
        self.iv = *iv;
        self.iv_filled = IV_LEN;
        self.stream = Some(Rc4::new(iv.into()));
    }

    /// Consume received bytes (receiving side)
    ///
    /// Leading bytes complete the IV and are swallowed; the rest is
    /// deciphered and returned. An IV may arrive split across calls.
    pub fn absorb(&mut self, input: &[u8]) -> BytesMut {
        let mut rest = input;

        if self.stream.is_none() {
            let take = (IV_LEN - self.iv_filled).min(rest.len());
            self.iv[self.iv_filled..self.iv_filled + take].copy_from_slice(&rest[..take]);
            self.iv_filled += take;
            rest = &rest[take..];

            if self.iv_filled < IV_LEN {
                return BytesMut::new();
            }
            self.stream = Some(Rc4::new((&self.iv).into()));
        }

        let mut out = BytesMut::from(rest);
        if let Some(stream) = self.stream.as_mut() {
            stream.apply_keystream(&mut out);
        }
        out
    }

    /// Encipher (or decipher) in place with the running keystream
    pub fn apply(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::KeystreamNotReady)?;
        stream.apply_keystream(buf);
        Ok(())
    }
}

impl Default for KeyStreamCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyStreamCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStreamCipher")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
