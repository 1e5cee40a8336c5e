//! Line codec and handler result encoding
//!
//! Commands travel as single ASCII lines:
//! ```text
//! keyword [arguments...] \n
//! ```
//! Every response chunk is terminated by `\n` as well.
//!
//! Handlers report a [`HandlerOutcome`]. The signed integer form
//! ([`ResponseCode`]) only exists at the wire boundary:
//!
//! | code      | outcome                                   |
//! |-----------|-------------------------------------------|
//! | `0`       | done, nothing written                     |
//! | `n > 0`   | done, `n` bytes written                   |
//! | `-1`      | malformed arguments                       |
//! | `<= -10`  | partial, `-code - 10` bytes, call again   |
//! | other < 0 | handler-specific error                    |

use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Default upper bound for a single command line
pub const MAX_LINE_LEN: usize = 64;

/// Errors that can occur while framing command lines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Command line too long: {0} bytes without newline")]
    LineTooLong(usize),

    #[error("Command line is not valid UTF-8")]
    InvalidUtf8,
}

/// Accumulates application bytes and yields complete command lines
#[derive(Debug)]
pub struct LineDecoder {
    buffer: BytesMut,
    max_len: usize,
    /// Inside an overlong line whose `\n` has not arrived yet
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_len),
            max_len,
            discarding: false,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to take the next line from the buffer
    ///
    /// Returns `Ok(None)` when more data is needed. Blank lines are skipped
    /// and a trailing `\r` is removed. A line that outgrows the limit is
    /// discarded up to and including its `\n`, even when that arrives later.
    pub fn next_line(&mut self) -> Result<Option<String>, CodecError> {
        loop {
            if self.discarding {
                match self.buffer.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        self.buffer.advance(pos + 1);
                        self.discarding = false;
                    }
                    None => {
                        self.buffer.clear();
                        return Ok(None);
                    }
                }
            }

            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > self.max_len {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(CodecError::LineTooLong(len));
                }
                return Ok(None);
            };

            let mut line = self.buffer.split_to(pos);
            self.buffer.advance(1);

            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.len() > self.max_len {
                return Err(CodecError::LineTooLong(line.len()));
            }
            if line.is_empty() {
                continue;
            }

            return String::from_utf8(line.to_vec())
                .map(Some)
                .map_err(|_| CodecError::InvalidUtf8);
        }
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

/// Handler-detected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerError {
    /// Arguments did not parse
    Parse,
    /// The resource is held by another continuation sequence
    Busy,
    /// Handler-specific code, opaque to the dispatcher (negative, not -1)
    Code(i16),
}

/// What a handler call produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Finished; `written` bytes are in the output buffer (0 means "OK")
    Done { written: usize },
    /// `written` bytes are ready now; call again with the same command
    Partial { written: usize },
    /// Finished with an error
    Error(HandlerError),
}

impl HandlerOutcome {
    pub const OK: Self = Self::Done { written: 0 };

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Partial { .. })
    }
}

/// Integer result code as exchanged with legacy callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCode(pub i16);

impl ResponseCode {
    pub const PARSE_ERROR: i16 = -1;
    pub const CONTINUATION_BASE: i16 = -10;

    pub fn value(self) -> i16 {
        self.0
    }

    /// Decode a raw handler return value
    pub fn outcome(self) -> HandlerOutcome {
        match self.0 {
            0 => HandlerOutcome::OK,
            n if n > 0 => HandlerOutcome::Done {
                written: n as usize,
            },
            Self::PARSE_ERROR => HandlerOutcome::Error(HandlerError::Parse),
            n if n <= Self::CONTINUATION_BASE => HandlerOutcome::Partial {
                written: (-(n as i32) - 10) as usize,
            },
            n => HandlerOutcome::Error(HandlerError::Code(n)),
        }
    }
}

/// Busy has no integer form: it is reported as "not found", never as a code
impl TryFrom<HandlerOutcome> for ResponseCode {
    type Error = HandlerError;

    fn try_from(outcome: HandlerOutcome) -> Result<Self, Self::Error> {
        let clamp = |n: usize| n.min(i16::MAX as usize - 10) as i16;
        match outcome {
            HandlerOutcome::Done { written } => Ok(Self(clamp(written))),
            HandlerOutcome::Partial { written } => Ok(Self(-clamp(written) - 10)),
            HandlerOutcome::Error(HandlerError::Parse) => Ok(Self(Self::PARSE_ERROR)),
            HandlerOutcome::Error(HandlerError::Busy) => Err(HandlerError::Busy),
            HandlerOutcome::Error(HandlerError::Code(code)) => Ok(Self(code)),
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
