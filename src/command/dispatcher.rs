//! Command dispatch and result translation

use bytes::{BufMut, Bytes, BytesMut};
use ecmd_shared::{HandlerError, HandlerOutcome, ResponseCode};
use std::sync::Arc;
use tracing::debug;

use super::{CommandTable, DeviceContext, Invocation, Output};
use crate::connection::ConnectionId;

const OK_TEXT: &[u8] = b"OK";
const PARSE_ERROR_TEXT: &[u8] = b"parse error";
const NOT_FOUND_TEXT: &[u8] = b"unknown command";

/// Result of dispatching one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Final response text
    Reply(Bytes),
    /// Response text for this turn; dispatch the same line again
    Continue(Bytes),
    /// Handler-specific failure code
    HandlerError(i16),
    /// No command matched (or its resource is held by another connection)
    NotFound,
}

impl DispatchOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, DispatchOutcome::Continue(_))
    }

    /// Render as one `\n`-terminated response chunk
    pub fn to_wire(&self) -> Bytes {
        let body: &[u8] = match self {
            DispatchOutcome::Reply(bytes) | DispatchOutcome::Continue(bytes) => bytes,
            DispatchOutcome::NotFound => NOT_FOUND_TEXT,
            DispatchOutcome::HandlerError(code) => {
                return Bytes::from(format!("{}\n", code));
            }
        };

        let mut wire = BytesMut::with_capacity(body.len() + 1);
        wire.put_slice(body);
        if body.last() != Some(&b'\n') {
            wire.put_u8(b'\n');
        }
        wire.freeze()
    }
}

/// Runs command lines against the table
pub struct CommandDispatcher {
    table: Arc<CommandTable>,
    capacity: usize,
}

impl CommandDispatcher {
    /// `capacity` bounds every response chunk
    pub fn new(table: Arc<CommandTable>, capacity: usize) -> Self {
        Self { table, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Match `command`, run its handler and translate the outcome
    pub fn dispatch(
        &self,
        ctx: &mut DeviceContext,
        connection: ConnectionId,
        command: &str,
    ) -> DispatchOutcome {
        let Some((entry, remainder)) = self.table.lookup(command) else {
            debug!("{} no handler for {:?}", connection, command);
            return DispatchOutcome::NotFound;
        };

        let mut scratch = vec![0u8; self.capacity];
        let mut out = Output::new(&mut scratch);
        let invocation = Invocation {
            remainder,
            connection,
        };

        let outcome = entry.handler().call(ctx, invocation, &mut out);
        match ResponseCode::try_from(outcome) {
            Ok(code) => debug!("{} {:?} -> {}", connection, entry.prefix(), code),
            Err(_) => debug!("{} {:?} -> busy", connection, entry.prefix()),
        }

        translate(outcome, out.as_bytes(), self.capacity)
    }
}

fn translate(outcome: HandlerOutcome, written: &[u8], capacity: usize) -> DispatchOutcome {
    let take = |n: usize| Bytes::copy_from_slice(&written[..n.min(written.len())]);
    let canned = |text: &[u8]| Bytes::copy_from_slice(&text[..text.len().min(capacity)]);

    match outcome {
        HandlerOutcome::Done { written: 0 } => DispatchOutcome::Reply(canned(OK_TEXT)),
        HandlerOutcome::Done { written: n } => DispatchOutcome::Reply(take(n)),
        HandlerOutcome::Partial { written: n } => DispatchOutcome::Continue(take(n)),
        HandlerOutcome::Error(HandlerError::Parse) => {
            DispatchOutcome::Reply(canned(PARSE_ERROR_TEXT))
        }
        HandlerOutcome::Error(HandlerError::Code(ResponseCode::PARSE_ERROR)) => {
            DispatchOutcome::Reply(canned(PARSE_ERROR_TEXT))
        }
        HandlerOutcome::Error(HandlerError::Busy) => DispatchOutcome::NotFound,
        HandlerOutcome::Error(HandlerError::Code(code)) => DispatchOutcome::HandlerError(code),
    }
}
