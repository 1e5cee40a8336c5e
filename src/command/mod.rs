//! Command execution for the device
//!
//! This module handles:
//! - The handler contract ([`CommandHandler`]) and its bounded output buffer
//! - The ordered prefix table of built-in commands
//! - Dispatching a command line and translating the handler outcome
//! - The device state handlers operate on ([`DeviceContext`])

pub mod args;
mod context;
mod dispatcher;
pub mod handlers;
mod table;

pub use context::{DeviceContext, SystemRequest};
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use table::{CommandEntry, CommandTable, CommandTableBuilder};

use crate::connection::ConnectionId;
use ecmd_shared::HandlerOutcome;

/// Per-call arguments of a handler
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Command text after the matched prefix
    pub remainder: &'a str,
    /// Connection that issued the command
    pub connection: ConnectionId,
}

/// Bounded response buffer
///
/// Writes past the capacity are silently cut off.
pub struct Output<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Output<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Append as much of `bytes` as fits; returns the number copied
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining());
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        n
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Finished, with whatever was written so far
    pub fn done(&self) -> HandlerOutcome {
        HandlerOutcome::Done { written: self.len }
    }

    /// More to come, with whatever was written so far
    pub fn partial(&self) -> HandlerOutcome {
        HandlerOutcome::Partial { written: self.len }
    }
}

impl std::fmt::Write for Output<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.push(s.as_bytes());
        Ok(())
    }
}

/// A command implementation
///
/// Handlers must not keep `out` beyond the call. A handler that returns
/// [`HandlerOutcome::Partial`] keeps its cursor in the [`DeviceContext`] and
/// expects to be called again with the same command.
pub trait CommandHandler: Send + Sync {
    fn call(
        &self,
        ctx: &mut DeviceContext,
        invocation: Invocation<'_>,
        out: &mut Output<'_>,
    ) -> HandlerOutcome;
}

impl<F> CommandHandler for F
where
    F: Fn(&mut DeviceContext, Invocation<'_>, &mut Output<'_>) -> HandlerOutcome + Send + Sync,
{
    fn call(
        &self,
        ctx: &mut DeviceContext,
        invocation: Invocation<'_>,
        out: &mut Output<'_>,
    ) -> HandlerOutcome {
        self(ctx, invocation, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_output_truncates_silently() {
        let mut buf = [0u8; 5];
        let mut out = Output::new(&mut buf);
        assert_eq!(out.push(b"abc"), 3);
        assert_eq!(out.push(b"defg"), 2);
        assert_eq!(out.as_bytes(), b"abcde");
        assert_eq!(out.remaining(), 0);

        assert!(write!(out, "more").is_ok());
        assert_eq!(out.done(), HandlerOutcome::Done { written: 5 });
    }

    #[test]
    fn test_output_outcomes() {
        let mut buf = [0u8; 16];
        let mut out = Output::new(&mut buf);
        assert!(out.is_empty());
        assert_eq!(out.done(), HandlerOutcome::OK);

        write!(out, "{:02x}", 0xab).unwrap();
        assert_eq!(out.partial(), HandlerOutcome::Partial { written: 2 });
        assert_eq!(out.capacity(), 16);
    }
}
