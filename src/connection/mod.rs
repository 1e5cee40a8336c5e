//! Connection handling for the command service
//!
//! This module handles:
//! - Device configuration from the environment
//! - Accepting peers and running one session per connection
//! - Driving the authentication gate and framing command lines
//! - Releasing shared resources when a connection ends

mod manager;
mod session;

pub use manager::{DeviceConfig, DeviceServer};

/// Identifies one accepted connection for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
