//! FS20 radio: `fs20 send <housecode> <addr> <cmd>`, `fs20 receive`, `fs20 ws300`

use ecmd_shared::HandlerOutcome;
use std::fmt::Write;

use super::{drain_queue, parse_error};
use crate::command::{args, DeviceContext, Invocation, Output};
use crate::hardware::Fs20Frame;

/// Arguments are hex; address and command keep their low byte
pub fn send(ctx: &mut DeviceContext, call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    let Some([housecode, addr, cmd]) = args::hex_args::<3>(call.remainder) else {
        return parse_error();
    };
    ctx.fs20_tx
        .send(Fs20Frame::new(housecode, addr as u8, cmd as u8));
    HandlerOutcome::OK
}

/// One `hhhhaacc` line per queued frame
pub fn receive(ctx: &mut DeviceContext, _call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    drain_queue(&mut ctx.fs20_rx, Fs20Frame::RECORD_LEN, out)
}

pub fn ws300(ctx: &mut DeviceContext, _call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    let _ = write!(out, "{}", ctx.ws300);
    out.done()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandDispatcher, CommandTable, DispatchOutcome};
    use crate::connection::ConnectionId;
    use crate::hardware::Ws300Reading;
    use crate::store::MemoryStore;
    use bytes::Bytes;
    use std::sync::Arc;

    fn dispatcher(capacity: usize) -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(CommandTable::standard()), capacity)
    }

    fn context() -> DeviceContext {
        DeviceContext::simulated(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_send_queues_frame() {
        let mut ctx = context();
        assert_eq!(
            dispatcher(64).dispatch(&mut ctx, ConnectionId(1), "fs20 send 1234 1 11"),
            DispatchOutcome::Reply(Bytes::from_static(b"OK"))
        );
        assert_eq!(ctx.fs20_tx.last(), Some(Fs20Frame::new(0x1234, 0x01, 0x11)));
    }

    #[test]
    fn test_send_needs_three_arguments() {
        let mut ctx = context();
        assert_eq!(
            dispatcher(64).dispatch(&mut ctx, ConnectionId(1), "fs20 send 1234 1"),
            DispatchOutcome::Reply(Bytes::from_static(b"parse error"))
        );
        assert_eq!(ctx.fs20_tx.sent_count(), 0);
    }

    #[test]
    fn test_receive_truncates_to_capacity_and_empties_queue() {
        let mut ctx = context();
        for i in 0..12u8 {
            assert!(ctx.fs20_rx.push(Fs20Frame::new(0xbeef, i, 0x10)));
        }

        let d = dispatcher(45);
        let DispatchOutcome::Reply(text) = d.dispatch(&mut ctx, ConnectionId(1), "fs20 receive") else {
            panic!("expected a reply");
        };
        assert_eq!(text.len(), 45);
        assert_eq!(text.iter().filter(|&&b| b == b'\n').count(), 5);
        assert!(text.starts_with(b"beef0010\n"));
        assert!(ctx.fs20_rx.is_empty());

        // nothing left for the next call
        assert_eq!(
            d.dispatch(&mut ctx, ConnectionId(1), "fs20 receive"),
            DispatchOutcome::Reply(Bytes::from_static(b"OK"))
        );
    }

    #[test]
    fn test_ws300_report() {
        let mut ctx = context();
        ctx.ws300 = Ws300Reading {
            temp: 21,
            temp_frac: 4,
            humidity: 55,
            wind: 3,
            wind_frac: 2,
            raining: true,
            rain_counter: 17,
        };
        assert_eq!(
            dispatcher(128).dispatch(&mut ctx, ConnectionId(1), "fs20 ws300"),
            DispatchOutcome::Reply(Bytes::from_static(
                b"deg: 21.4 C, hyg: 55%, wind: 3.2 km/h, rain: 1, counter: 17"
            ))
        );
    }
}
