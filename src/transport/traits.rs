//! Transport trait abstraction for pluggable listeners

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A transport stream that can read and write bytes
#[async_trait]
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Close the transport gracefully
    async fn shutdown(&mut self) -> Result<()>;

    /// Arrange for dropping the stream to reset the connection instead of
    /// closing it
    fn abort(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Source of inbound connections
#[async_trait]
pub trait TransportAcceptor: Send + Sync {
    /// The stream type this acceptor produces
    type Stream: TransportStream;

    /// Wait for the next peer; returns the stream and a printable peer address
    async fn accept(&self) -> Result<(Self::Stream, String)>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
