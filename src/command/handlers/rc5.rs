//! RC5 infrared: `ir send <addr> <cmd>`, `ir receive`

use ecmd_shared::HandlerOutcome;

use super::{drain_queue, parse_error};
use crate::command::{args, DeviceContext, Invocation, Output};
use crate::hardware::Rc5Frame;

/// Decimal address and code
pub fn send(ctx: &mut DeviceContext, call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    let Some([addr, code]) = args::dec_args::<2>(call.remainder) else {
        return parse_error();
    };
    ctx.rc5_tx.send(Rc5Frame::new(addr as u8, code as u8));
    HandlerOutcome::OK
}

/// One `aacc` line per received code, both fields in decimal
pub fn receive(ctx: &mut DeviceContext, _call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    drain_queue(&mut ctx.rc5_rx, Rc5Frame::RECORD_LEN, out)
}
