//! Device peripherals
//!
//! This module handles:
//! - The global interrupt-enable flag and scoped critical sections
//! - Port I/O registers
//! - The 1-Wire bus
//! - RF (FS20) and IR (RC5) frames, event queues and transmitters
//!
//! On a host build every peripheral is simulated in memory.

pub mod onewire;
pub mod ports;
pub mod queue;
pub mod radio;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use onewire::{BusError, OneWire, OneWireBus, RomCode, SimulatedBus};
pub use ports::{PortIo, IO_PORTS};
pub use queue::EventQueue;
pub use radio::{Fs20Frame, Rc5Frame, Transmitter, Ws300Reading};

/// Global interrupt-enable flag
///
/// Clones share the same flag, so a bus driver can observe the state set by
/// a handler's critical section.
#[derive(Debug, Clone)]
pub struct Interrupts {
    enabled: Arc<AtomicBool>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Save the current state and disable interrupts until the guard drops
    pub fn critical_section(&self) -> CriticalSection<'_> {
        let saved = self.enabled.swap(false, Ordering::SeqCst);
        CriticalSection {
            flag: &self.enabled,
            saved,
        }
    }
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores the saved interrupt state when dropped
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
#[derive(Debug)]
pub struct CriticalSection<'a> {
    flag: &'a AtomicBool,
    saved: bool,
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        self.flag.store(self.saved, Ordering::SeqCst);
    }
}
