//! `show version`, `reset`, `bootloader`

use ecmd_shared::HandlerOutcome;
use std::fmt::Write;

use crate::command::{DeviceContext, Invocation, Output, SystemRequest};

pub fn show_version(_ctx: &mut DeviceContext, _call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    let _ = write!(out, "version {}", env!("CARGO_PKG_VERSION"));
    out.done()
}

/// Acknowledged with `OK`; the server restarts after the reply is sent
pub fn reset(ctx: &mut DeviceContext, _call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    ctx.request(SystemRequest::Reset);
    HandlerOutcome::OK
}

pub fn bootloader(ctx: &mut DeviceContext, _call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    ctx.request(SystemRequest::Bootloader);
    HandlerOutcome::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandDispatcher, CommandTable, DispatchOutcome};
    use crate::connection::ConnectionId;
    use crate::store::MemoryStore;
    use bytes::Bytes;
    use std::sync::Arc;

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(CommandTable::standard()), 64)
    }

    #[test]
    fn test_version() {
        let mut ctx = DeviceContext::simulated(Box::new(MemoryStore::new()));
        let expected = format!("version {}", env!("CARGO_PKG_VERSION"));
        assert_eq!(
            dispatcher().dispatch(&mut ctx, ConnectionId(1), "show version"),
            DispatchOutcome::Reply(Bytes::from(expected))
        );
    }

    #[test]
    fn test_reset_records_request() {
        let mut ctx = DeviceContext::simulated(Box::new(MemoryStore::new()));
        assert_eq!(
            dispatcher().dispatch(&mut ctx, ConnectionId(1), "reset"),
            DispatchOutcome::Reply(Bytes::from_static(b"OK"))
        );
        assert_eq!(ctx.take_request(), Some(SystemRequest::Reset));
    }

    #[test]
    fn test_bootloader_records_request() {
        let mut ctx = DeviceContext::simulated(Box::new(MemoryStore::new()));
        dispatcher().dispatch(&mut ctx, ConnectionId(1), "BOOTLOADER");
        assert_eq!(ctx.take_request(), Some(SystemRequest::Bootloader));
    }
}
