//! Port I/O: `io set ddr|port <port> <data> [mask]`, `io get ddr|port|pin <port>`
//!
//! All numbers are hex. The mask defaults to `ff`.

use ecmd_shared::HandlerOutcome;
use std::fmt::Write;
use tracing::debug;

use super::parse_error;
use crate::command::{args, DeviceContext, Invocation, Output};
use crate::hardware::{PortIo, IO_PORTS};

fn port_index(token: &str) -> Option<usize> {
    let port = usize::from(args::hex(token)?);
    (port < IO_PORTS).then_some(port)
}

/// `port data [mask]`
fn parse_set(text: &str) -> Option<(usize, u8, u8)> {
    let mut tokens = text.split_whitespace();
    let port = port_index(tokens.next()?)?;
    let data = args::hex(tokens.next()?)? as u8;
    let mask = match tokens.next() {
        Some(token) => args::hex(token)? as u8,
        None => 0xff,
    };
    Some((port, data, mask))
}

fn parse_get(text: &str) -> Option<usize> {
    port_index(text.split_whitespace().next()?)
}

fn set_with(
    ctx: &mut DeviceContext,
    call: Invocation<'_>,
    register: &str,
    apply: fn(&mut PortIo, usize, u8, u8) -> Option<u8>,
) -> HandlerOutcome {
    let Some((port, data, mask)) = parse_set(call.remainder) else {
        return parse_error();
    };
    match apply(&mut ctx.ports, port, data, mask) {
        Some(value) => {
            debug!("{} {} <- 0x{:02x}", register, port, value);
            HandlerOutcome::OK
        }
        None => parse_error(),
    }
}

fn get_with(
    ctx: &mut DeviceContext,
    call: Invocation<'_>,
    out: &mut Output<'_>,
    read: fn(&PortIo, usize) -> Option<u8>,
) -> HandlerOutcome {
    let Some(port) = parse_get(call.remainder) else {
        return parse_error();
    };
    let Some(value) = read(&ctx.ports, port) else {
        return parse_error();
    };
    let _ = write!(out, "port {}: 0x{:02x}", port, value);
    out.done()
}

pub fn set_ddr(ctx: &mut DeviceContext, call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    set_with(ctx, call, "ddr", PortIo::set_ddr)
}

pub fn set_port(ctx: &mut DeviceContext, call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    set_with(ctx, call, "port", PortIo::set_port)
}

pub fn get_ddr(ctx: &mut DeviceContext, call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    get_with(ctx, call, out, PortIo::ddr)
}

pub fn get_port(ctx: &mut DeviceContext, call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    get_with(ctx, call, out, PortIo::port)
}

pub fn get_pin(ctx: &mut DeviceContext, call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    get_with(ctx, call, out, PortIo::input)
}
