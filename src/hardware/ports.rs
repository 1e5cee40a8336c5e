//! Port I/O register file
//!
//! Each port has a data direction register (DDR), an output register (PORT)
//! and externally driven pin levels. Reading the pins returns the output
//! register for output bits and the external level for input bits.

/// Number of 8-bit I/O ports
pub const IO_PORTS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct PortIo {
    ddr: [u8; IO_PORTS],
    port: [u8; IO_PORTS],
    external: [u8; IO_PORTS],
}

impl PortIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ddr(&self, port: usize) -> Option<u8> {
        self.ddr.get(port).copied()
    }

    pub fn port(&self, port: usize) -> Option<u8> {
        self.port.get(port).copied()
    }

    /// Update the masked bits of a DDR; `None` for an unknown port
    pub fn set_ddr(&mut self, port: usize, data: u8, mask: u8) -> Option<u8> {
        let reg = self.ddr.get_mut(port)?;
        *reg = (*reg & !mask) | (data & mask);
        Some(*reg)
    }

    /// Update the masked bits of an output register
    pub fn set_port(&mut self, port: usize, data: u8, mask: u8) -> Option<u8> {
        let reg = self.port.get_mut(port)?;
        *reg = (*reg & !mask) | (data & mask);
        Some(*reg)
    }

    /// Current pin levels of a port
    pub fn input(&self, port: usize) -> Option<u8> {
        let ddr = self.ddr(port)?;
        Some((self.port[port] & ddr) | (self.external[port] & !ddr))
    }

    /// Drive the external side of a port (simulation input)
    pub fn set_external(&mut self, port: usize, level: u8) -> Option<()> {
        *self.external.get_mut(port)? = level;
        Some(())
    }
}
