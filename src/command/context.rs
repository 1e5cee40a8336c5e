//! Device state shared by all command handlers

use tracing::info;

use crate::connection::ConnectionId;
use crate::hardware::{
    EventQueue, Fs20Frame, Interrupts, OneWire, OneWireBus, PortIo, Rc5Frame, SimulatedBus,
    Transmitter, Ws300Reading,
};
use crate::store::ConfigStore;

/// Received FS20 frames kept until the next `fs20 receive`
pub const FS20_QUEUE_LEN: usize = 16;

/// Received RC5 frames kept until the next `ir receive`
pub const RC5_QUEUE_LEN: usize = 10;

/// Actions that end the running firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRequest {
    Reset,
    Bootloader,
}

impl std::fmt::Display for SystemRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemRequest::Reset => write!(f, "reset"),
            SystemRequest::Bootloader => write!(f, "bootloader"),
        }
    }
}

/// Everything a handler may touch
///
/// One instance per device, owned by the server and lent to one handler call
/// at a time.
pub struct DeviceContext {
    pub store: Box<dyn ConfigStore>,
    pub interrupts: Interrupts,
    pub ports: PortIo,
    pub onewire: OneWire,
    pub fs20_rx: EventQueue<Fs20Frame>,
    pub fs20_tx: Transmitter<Fs20Frame>,
    pub ws300: Ws300Reading,
    pub rc5_rx: EventQueue<Rc5Frame>,
    pub rc5_tx: Transmitter<Rc5Frame>,
    pending: Option<SystemRequest>,
}

impl DeviceContext {
    pub fn new(store: Box<dyn ConfigStore>, bus: Box<dyn OneWireBus>, interrupts: Interrupts) -> Self {
        Self {
            store,
            interrupts,
            ports: PortIo::new(),
            onewire: OneWire::new(bus),
            fs20_rx: EventQueue::new(FS20_QUEUE_LEN),
            fs20_tx: Transmitter::new("fs20"),
            ws300: Ws300Reading::default(),
            rc5_rx: EventQueue::new(RC5_QUEUE_LEN),
            rc5_tx: Transmitter::new("rc5"),
            pending: None,
        }
    }

    /// Context backed by simulated peripherals
    pub fn simulated(store: Box<dyn ConfigStore>) -> Self {
        let interrupts = Interrupts::new();
        let bus = SimulatedBus::demo().watch(interrupts.clone());
        Self::new(store, Box::new(bus), interrupts)
    }

    /// Record a reset/bootloader request; the first one wins
    pub fn request(&mut self, request: SystemRequest) {
        if self.pending.is_none() {
            info!("System request: {}", request);
            self.pending = Some(request);
        }
    }

    pub fn take_request(&mut self) -> Option<SystemRequest> {
        self.pending.take()
    }

    /// Free every resource held on behalf of a finished connection
    pub fn release_connection(&mut self, connection: ConnectionId) {
        if self.onewire.release_for(connection) {
            info!("Released 1-Wire enumeration held by {}", connection);
        }
    }
}
