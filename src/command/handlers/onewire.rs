//! 1-Wire bus: `1w list`, `1w get <rom>`, `1w convert [rom]`
//!
//! Bus transactions are timing critical and run with interrupts disabled.
//! `1w list` reports one ROM code per call and holds the bus enumeration for
//! the calling connection until the search is exhausted.

use ecmd_shared::{HandlerError, HandlerOutcome};
use std::fmt::Write;
use tracing::warn;

use super::{device_error, parse_error};
use crate::command::{args, DeviceContext, Invocation, Output};
use crate::hardware::onewire::{is_eeprom, is_temperature_sensor, Claim};
use crate::hardware::{BusError, RomCode};
use crate::store::MacAddr;

fn write_rom(out: &mut Output<'_>, rom: &RomCode) {
    for byte in rom {
        let _ = write!(out, "{:02x}", byte);
    }
}

pub fn list(ctx: &mut DeviceContext, call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    let found = match ctx.onewire.claim(call.connection) {
        Claim::Busy => return HandlerOutcome::Error(HandlerError::Busy),
        Claim::Started => {
            let _cs = ctx.interrupts.critical_section();
            ctx.onewire.bus().search_first()
        }
        Claim::Resumed => {
            let _cs = ctx.interrupts.critical_section();
            ctx.onewire.bus().search_next()
        }
    };

    match found {
        Ok(Some(rom)) => {
            write_rom(out, &rom);
            out.partial()
        }
        Ok(None) => {
            ctx.onewire.release();
            HandlerOutcome::OK
        }
        Err(e) => {
            ctx.onewire.release();
            warn!("1-Wire search failed: {}", e);
            device_error()
        }
    }
}

pub fn get(ctx: &mut DeviceContext, call: Invocation<'_>, out: &mut Output<'_>) -> HandlerOutcome {
    let Some(rom) = args::rom(call.remainder) else {
        return parse_error();
    };

    let result = {
        let _cs = ctx.interrupts.critical_section();
        let bus = ctx.onewire.bus();
        if is_temperature_sensor(&rom) {
            bus.read_temperature(&rom)
                .map(|t| write!(out, "temperature: {}", t))
        } else if is_eeprom(&rom) {
            bus.read_mac(&rom)
                .map(|mac| write!(out, "mac: {}", MacAddr(mac)))
        } else {
            Ok(write!(out, "unknown sensor type"))
        }
    };

    match result {
        Ok(_) => out.done(),
        Err(e) => {
            warn!("1-Wire read failed: {}", e);
            device_error()
        }
    }
}

/// Without a ROM code every sensor on the bus converts
pub fn convert(ctx: &mut DeviceContext, call: Invocation<'_>, _out: &mut Output<'_>) -> HandlerOutcome {
    let rom = args::rom(call.remainder);

    let result = {
        let _cs = ctx.interrupts.critical_section();
        ctx.onewire.bus().convert(rom.as_ref())
    };

    match result {
        Ok(()) => HandlerOutcome::OK,
        Err(BusError::WrongFamily(_)) => parse_error(),
        Err(e) => {
            warn!("1-Wire convert failed: {}", e);
            device_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::command::{CommandDispatcher, CommandTable, DeviceContext, DispatchOutcome};
    use crate::connection::ConnectionId;
    use crate::hardware::{BusError, Interrupts, OneWireBus, RomCode, SimulatedBus};
    use crate::hardware::onewire::Temperature;
    use crate::store::MemoryStore;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const ME: ConnectionId = ConnectionId(1);
    const OTHER: ConnectionId = ConnectionId(2);

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(CommandTable::standard()), 64)
    }

    fn reply(text: &str) -> DispatchOutcome {
        DispatchOutcome::Reply(Bytes::copy_from_slice(text.as_bytes()))
    }

    fn found(rom: &str) -> DispatchOutcome {
        DispatchOutcome::Continue(Bytes::copy_from_slice(rom.as_bytes()))
    }

    /// Bus where nothing ever answers
    struct SilentBus;

    impl OneWireBus for SilentBus {
        fn search_first(&mut self) -> Result<Option<RomCode>, BusError> {
            Err(BusError::NoPresence)
        }
        fn search_next(&mut self) -> Result<Option<RomCode>, BusError> {
            Err(BusError::NoPresence)
        }
        fn read_temperature(&mut self, _rom: &RomCode) -> Result<Temperature, BusError> {
            Err(BusError::NoPresence)
        }
        fn read_mac(&mut self, _rom: &RomCode) -> Result<[u8; 6], BusError> {
            Err(BusError::NoPresence)
        }
        fn convert(&mut self, _rom: Option<&RomCode>) -> Result<(), BusError> {
            Err(BusError::NoPresence)
        }
    }

    #[test]
    fn test_list_enumerates_with_continuation() {
        let irq = Interrupts::new();
        let bus = SimulatedBus::demo().watch(irq.clone());
        let unguarded = bus.unguarded_ops();
        let mut ctx = DeviceContext::new(Box::new(MemoryStore::new()), Box::new(bus), irq.clone());
        let d = dispatcher();

        assert_eq!(d.dispatch(&mut ctx, ME, "1w list"), found("104a3b6c0108009e"));
        assert_eq!(d.dispatch(&mut ctx, OTHER, "1w list"), DispatchOutcome::NotFound);
        assert_eq!(d.dispatch(&mut ctx, ME, "1w list"), found("28ff12906116045c"));
        assert_eq!(d.dispatch(&mut ctx, ME, "1w list"), found("89219f0a0000003d"));
        assert_eq!(d.dispatch(&mut ctx, ME, "1w list"), reply("OK"));

        // enumeration finished, the flag is free again
        assert_eq!(ctx.onewire.owner(), None);
        assert_eq!(d.dispatch(&mut ctx, OTHER, "1w list"), found("104a3b6c0108009e"));

        assert_eq!(unguarded.load(Ordering::SeqCst), 0);
        assert!(irq.is_enabled());
    }

    #[test]
    fn test_abandoned_list_is_released_with_connection() {
        let mut ctx = DeviceContext::simulated(Box::new(MemoryStore::new()));
        let d = dispatcher();

        assert!(d.dispatch(&mut ctx, ME, "1w list").is_continue());
        assert_eq!(d.dispatch(&mut ctx, OTHER, "1w list"), DispatchOutcome::NotFound);

        ctx.release_connection(ME);
        assert!(d.dispatch(&mut ctx, OTHER, "1w list").is_continue());
    }

    #[test]
    fn test_list_bus_error_releases_flag() {
        let mut ctx = DeviceContext::new(
            Box::new(MemoryStore::new()),
            Box::new(SilentBus),
            Interrupts::new(),
        );
        assert_eq!(
            dispatcher().dispatch(&mut ctx, ME, "1w list"),
            DispatchOutcome::HandlerError(-2)
        );
        assert_eq!(ctx.onewire.owner(), None);
    }

    #[test]
    fn test_get_reads_by_family() {
        let mut ctx = DeviceContext::simulated(Box::new(MemoryStore::new()));
        let d = dispatcher();

        assert_eq!(
            d.dispatch(&mut ctx, ME, "1w get 104a3b6c0108009e"),
            reply("temperature: 21.5")
        );
        assert_eq!(
            d.dispatch(&mut ctx, ME, "1w get 28ff12906116045c"),
            reply("temperature: -3.5")
        );
        assert_eq!(
            d.dispatch(&mut ctx, ME, "1w get 89219f0a0000003d"),
            reply("mac: 00:50:c2:4f:10:2a")
        );
        assert_eq!(
            d.dispatch(&mut ctx, ME, "1w get 0100000000000000"),
            reply("unknown sensor type")
        );
        assert_eq!(d.dispatch(&mut ctx, ME, "1w get 10zz"), reply("parse error"));
    }

    #[test]
    fn test_get_missing_device_is_device_error() {
        let mut ctx = DeviceContext::simulated(Box::new(MemoryStore::new()));
        assert_eq!(
            dispatcher().dispatch(&mut ctx, ME, "1w get 1000000000000000"),
            DispatchOutcome::HandlerError(-2)
        );
    }

    #[test]
    fn test_convert() {
        let mut ctx = DeviceContext::simulated(Box::new(MemoryStore::new()));
        let d = dispatcher();

        assert_eq!(d.dispatch(&mut ctx, ME, "1w convert"), reply("OK"));
        assert_eq!(
            d.dispatch(&mut ctx, ME, "1w convert 104a3b6c0108009e"),
            reply("OK")
        );
        assert_eq!(
            d.dispatch(&mut ctx, ME, "1w convert 89219f0a0000003d"),
            reply("parse error")
        );

        let mut silent = DeviceContext::new(
            Box::new(MemoryStore::new()),
            Box::new(SilentBus),
            Interrupts::new(),
        );
        assert_eq!(
            d.dispatch(&mut silent, ME, "1w convert"),
            DispatchOutcome::HandlerError(-2)
        );
    }
}
