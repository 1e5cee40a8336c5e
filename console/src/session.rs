//! Authenticated connection to one device

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use ecmd_shared::{ChallengeCipher, ChannelMode, PeerChannel};
use rand::rngs::OsRng;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub struct DeviceSession<S> {
    stream: S,
    channel: PeerChannel,
    read_buf: Vec<u8>,
    /// Device output that arrived together with the challenge
    pending: Bytes,
}

impl<S: AsyncRead + AsyncWrite + Unpin> DeviceSession<S> {
    /// Answer the device's challenge; returns once commands may be sent
    pub async fn establish(stream: S, mode: ChannelMode, cipher: Arc<ChallengeCipher>) -> Result<Self> {
        let mut session = Self {
            stream,
            channel: PeerChannel::new(mode, cipher),
            read_buf: vec![0u8; 4096],
            pending: Bytes::new(),
        };

        while !session.channel.is_ready() {
            let n = session
                .stream
                .read(&mut session.read_buf)
                .await
                .context("Reading challenge")?;
            if n == 0 {
                bail!("Device closed the connection before sending a challenge");
            }

            let output = session.channel.receive(&session.read_buf[..n]);
            if let Some(response) = output.send {
                session.stream.write_all(&response).await?;
            }
            session.pending = output.deliver;
        }

        Ok(session)
    }

    /// Send one command line
    pub async fn send(&mut self, line: &str) -> Result<()> {
        let mut payload = line.trim_end().as_bytes().to_vec();
        payload.push(b'\n');
        let sealed = self.channel.seal(&payload, &mut OsRng)?;
        self.stream.write_all(&sealed).await?;
        Ok(())
    }

    /// Next chunk of device output; `None` once the device hung up
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        if !self.pending.is_empty() {
            return Ok(Some(std::mem::take(&mut self.pending)));
        }

        loop {
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(None);
            }
            let output = self.channel.receive(&self.read_buf[..n]);
            // the device IV decodes to nothing
            if !output.deliver.is_empty() {
                return Ok(Some(output.deliver));
            }
        }
    }
}
