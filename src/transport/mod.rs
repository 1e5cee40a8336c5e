pub mod tcp;
pub mod traits;

pub use tcp::{TcpAcceptor, TcpTransportStream};
pub use traits::{TransportAcceptor, TransportStream};
