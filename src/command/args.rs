//! Argument parsing helpers
//!
//! Arguments are whitespace separated. Numbers are read the way the
//! firmware's scanf patterns read them: `%x` accepts an optional `0x`
//! prefix, `%u` plain decimal. Extra trailing arguments are ignored.

use std::net::Ipv4Addr;

use crate::hardware::RomCode;
use crate::store::MacAddr;

pub fn hex(token: &str) -> Option<u16> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u16::from_str_radix(digits, 16).ok()
}

pub fn dec(token: &str) -> Option<u16> {
    token.parse().ok()
}

/// Parse the first `N` arguments as hex numbers
pub fn hex_args<const N: usize>(text: &str) -> Option<[u16; N]> {
    let mut values = [0u16; N];
    let mut tokens = text.split_whitespace();
    for value in values.iter_mut() {
        *value = hex(tokens.next()?)?;
    }
    Some(values)
}

/// Parse the first `N` arguments as decimal numbers
pub fn dec_args<const N: usize>(text: &str) -> Option<[u16; N]> {
    let mut values = [0u16; N];
    let mut tokens = text.split_whitespace();
    for value in values.iter_mut() {
        *value = dec(tokens.next()?)?;
    }
    Some(values)
}

/// Dotted quad; any octet above 255 is rejected
pub fn ipv4(token: &str) -> Option<Ipv4Addr> {
    token.parse().ok()
}

/// `aa:bb:cc:dd:ee:ff`
pub fn mac(token: &str) -> Option<MacAddr> {
    let mut bytes = [0u8; 6];
    let mut parts = token.split(':');
    for byte in bytes.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(MacAddr(bytes))
}

/// 16 hex digits, most significant byte (family code) first
pub fn rom(text: &str) -> Option<RomCode> {
    let digits = text.trim_start().get(..16)?;
    if !digits.is_ascii() {
        return None;
    }
    let mut rom = [0u8; 8];
    for (i, byte) in rom.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[2 * i..2 * i + 2], 16).ok()?;
    }
    Some(rom)
}
