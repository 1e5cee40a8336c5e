//! Network configuration: `ip`, `mac`, `show ip`, `show mac`

use ecmd_shared::HandlerOutcome;
use std::fmt::Write;
use tracing::{error, info};

use super::{device_error, parse_error};
use crate::command::{args, DeviceContext, Invocation, Output};
use crate::store::NetworkConfig;

/// `ip <address> <netmask> <gateway>`
///
/// All three addresses are validated before anything is stored.
pub fn set_ip(ctx: &mut DeviceContext, call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    let mut tokens = call.remainder.split_whitespace();
    let mut next = || tokens.next().and_then(args::ipv4);

    let (Some(ip), Some(netmask), Some(gateway)) = (next(), next(), next()) else {
        return parse_error();
    };

    let network = NetworkConfig {
        ip,
        netmask,
        gateway,
    };
    if let Err(e) = ctx.store.set_network(&network) {
        error!("Failed to store network configuration: {}", e);
        return device_error();
    }

    info!("Network configuration: {}/{} via {}", ip, netmask, gateway);
    HandlerOutcome::OK
}

pub fn show_ip(ctx: &mut DeviceContext, _call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    let network = ctx.store.network();
    let _ = write!(
        out,
        "ip {}/{}, gateway {}",
        network.ip, network.netmask, network.gateway
    );
    out.done()
}

/// `mac aa:bb:cc:dd:ee:ff`
pub fn set_mac(ctx: &mut DeviceContext, call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    let Some(mac) = call.remainder.split_whitespace().next().and_then(args::mac) else {
        return parse_error();
    };

    if let Err(e) = ctx.store.set_mac(mac) {
        error!("Failed to store MAC address: {}", e);
        return device_error();
    }

    info!("MAC address: {}", mac);
    HandlerOutcome::OK
}

pub fn show_mac(ctx: &mut DeviceContext, _call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    let _ = write!(out, "mac {}", ctx.store.mac());
    out.done()
}
