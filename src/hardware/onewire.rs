//! 1-Wire bus
//!
//! [`OneWireBus`] is the driver contract. [`OneWire`] wraps a driver with the
//! reentrancy flag that serialises ROM enumeration across connections: a
//! search keeps its cursor inside the driver, so only one enumeration may be
//! in flight at a time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::Interrupts;
use crate::connection::ConnectionId;

/// 64-bit device address; byte 0 is the family code
pub type RomCode = [u8; 8];

/// Family codes the device knows how to talk to
pub mod family {
    pub const DS18S20: u8 = 0x10;
    pub const DS1822: u8 = 0x22;
    pub const DS18B20: u8 = 0x28;
    pub const DS2502: u8 = 0x09;
    pub const DS2502_E48: u8 = 0x89;
}

pub fn is_temperature_sensor(rom: &RomCode) -> bool {
    matches!(rom[0], family::DS18S20 | family::DS1822 | family::DS18B20)
}

pub fn is_eeprom(rom: &RomCode) -> bool {
    matches!(rom[0], family::DS2502 | family::DS2502_E48)
}

/// Bus-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("No device answered the reset pulse")]
    NoPresence,

    #[error("Device family 0x{0:02x} does not support this operation")]
    WrongFamily(u8),
}

/// Temperature in half-degree steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temperature {
    pub half_degrees: i16,
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.half_degrees < 0 { "-" } else { "" };
        let abs = self.half_degrees.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 2, if abs % 2 == 1 { 5 } else { 0 })
    }
}

/// Driver contract for a 1-Wire master
pub trait OneWireBus: Send {
    /// Restart the ROM search; `None` when the bus is empty
    fn search_first(&mut self) -> Result<Option<RomCode>, BusError>;

    /// Continue the ROM search; `None` after the last device
    fn search_next(&mut self) -> Result<Option<RomCode>, BusError>;

    fn read_temperature(&mut self, rom: &RomCode) -> Result<Temperature, BusError>;

    /// Read the MAC address stored in an EEPROM device
    fn read_mac(&mut self, rom: &RomCode) -> Result<[u8; 6], BusError>;

    /// Start a temperature conversion on one device or on all of them
    fn convert(&mut self, rom: Option<&RomCode>) -> Result<(), BusError>;
}

/// Result of trying to take the enumeration flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Flag was free; the caller starts a new enumeration
    Started,
    /// Caller already owns the enumeration in progress
    Resumed,
    /// Another connection owns it
    Busy,
}

/// Shared 1-Wire resource
pub struct OneWire {
    bus: Box<dyn OneWireBus>,
    owner: Option<ConnectionId>,
}

impl OneWire {
    pub fn new(bus: Box<dyn OneWireBus>) -> Self {
        Self { bus, owner: None }
    }

    pub fn claim(&mut self, caller: ConnectionId) -> Claim {
        match self.owner {
            None => {
                self.owner = Some(caller);
                Claim::Started
            }
            Some(owner) if owner == caller => Claim::Resumed,
            Some(_) => Claim::Busy,
        }
    }

    pub fn release(&mut self) {
        self.owner = None;
    }

    /// Drop the flag if `caller` holds it; returns whether it did
    pub fn release_for(&mut self, caller: ConnectionId) -> bool {
        if self.owner == Some(caller) {
            self.owner = None;
            true
        } else {
            false
        }
    }

    pub fn owner(&self) -> Option<ConnectionId> {
        self.owner
    }

    pub fn bus(&mut self) -> &mut dyn OneWireBus {
        self.bus.as_mut()
    }
}

impl std::fmt::Debug for OneWire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneWire").field("owner", &self.owner).finish()
    }
}

/// A device on the simulated bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimDevice {
    Thermometer { rom: RomCode, temperature: Temperature },
    Eeprom { rom: RomCode, mac: [u8; 6] },
    Other { rom: RomCode },
}

impl SimDevice {
    pub fn rom(&self) -> &RomCode {
        match self {
            Self::Thermometer { rom, .. } | Self::Eeprom { rom, .. } | Self::Other { rom } => rom,
        }
    }
}

/// In-memory bus with a fixed device list
///
/// When attached to the interrupt flag it counts operations that ran with
/// interrupts enabled.
pub struct SimulatedBus {
    devices: Vec<SimDevice>,
    cursor: usize,
    interrupts: Option<Interrupts>,
    unguarded: Arc<AtomicUsize>,
}

impl SimulatedBus {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        Self {
            devices,
            cursor: 0,
            interrupts: None,
            unguarded: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Two thermometers and a MAC EEPROM
    pub fn demo() -> Self {
        Self::new(vec![
            SimDevice::Thermometer {
                rom: [0x10, 0x4a, 0x3b, 0x6c, 0x01, 0x08, 0x00, 0x9e],
                temperature: Temperature { half_degrees: 43 },
            },
            SimDevice::Thermometer {
                rom: [0x28, 0xff, 0x12, 0x90, 0x61, 0x16, 0x04, 0x5c],
                temperature: Temperature { half_degrees: -7 },
            },
            SimDevice::Eeprom {
                rom: [0x89, 0x21, 0x9f, 0x0a, 0x00, 0x00, 0x00, 0x3d],
                mac: [0x00, 0x50, 0xc2, 0x4f, 0x10, 0x2a],
            },
        ])
    }

    pub fn watch(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Counter of bus operations performed outside a critical section
    pub fn unguarded_ops(&self) -> Arc<AtomicUsize> {
        self.unguarded.clone()
    }

    fn access(&self) -> Result<(), BusError> {
        if let Some(irq) = &self.interrupts {
            if irq.is_enabled() {
                warn!("1-Wire access with interrupts enabled");
                self.unguarded.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<RomCode> {
        let found = self.devices.get(self.cursor).map(|d| *d.rom());
        if found.is_some() {
            self.cursor += 1;
        }
        found
    }

    fn find(&self, rom: &RomCode) -> Result<&SimDevice, BusError> {
        self.devices
            .iter()
            .find(|d| d.rom() == rom)
            .ok_or(BusError::NoPresence)
    }
}

impl OneWireBus for SimulatedBus {
    fn search_first(&mut self) -> Result<Option<RomCode>, BusError> {
        self.access()?;
        self.cursor = 0;
        Ok(self.advance())
    }

    fn search_next(&mut self) -> Result<Option<RomCode>, BusError> {
        self.access()?;
        Ok(self.advance())
    }

    fn read_temperature(&mut self, rom: &RomCode) -> Result<Temperature, BusError> {
        self.access()?;
        match self.find(rom)? {
            SimDevice::Thermometer { temperature, .. } => Ok(*temperature),
            _ => Err(BusError::WrongFamily(rom[0])),
        }
    }

    fn read_mac(&mut self, rom: &RomCode) -> Result<[u8; 6], BusError> {
        self.access()?;
        match self.find(rom)? {
            SimDevice::Eeprom { mac, .. } => Ok(*mac),
            _ => Err(BusError::WrongFamily(rom[0])),
        }
    }

    fn convert(&mut self, rom: Option<&RomCode>) -> Result<(), BusError> {
        self.access()?;
        match rom {
            Some(rom) => match self.find(rom)? {
                SimDevice::Thermometer { .. } => Ok(()),
                _ => Err(BusError::WrongFamily(rom[0])),
            },
            None if self.devices.is_empty() => Err(BusError::NoPresence),
            None => Ok(()),
        }
    }
}
