//! ecmd console
//!
//! ```text
//! ecmd-console [address] [command...]
//! ```
//!
//! Without a command, lines typed on stdin are sent one by one and device
//! output is printed as it arrives. With a command, it is sent once and the
//! console exits after the device has been quiet for a moment.
//!
//! `ECMD_KEY`, `ECMD_AUTH` and `ECMD_ENCRYPT` must match the device.

mod session;

use anyhow::{bail, Context, Result};
use ecmd_shared::handshake::DEFAULT_PORT;
use ecmd_shared::{ChallengeCipher, ChannelMode, SharedKey};
use session::DeviceSession;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Quiet period that ends a one-shot command
const IDLE_TIMEOUT: Duration = Duration::from_millis(750);

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let address = args
        .next()
        .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_PORT));
    let command: Vec<String> = args.collect();

    let key = match std::env::var("ECMD_KEY") {
        Ok(key) => SharedKey::from_slice(key.as_bytes()).context("Invalid ECMD_KEY")?,
        Err(_) => SharedKey::default(),
    };
    let mode = ChannelMode {
        authenticate: switch("ECMD_AUTH")?,
        encrypt: switch("ECMD_ENCRYPT")?,
    };
    let cipher = Arc::new(ChallengeCipher::new(&key)?);

    let stream = TcpStream::connect(&address)
        .await
        .with_context(|| format!("Failed to connect to {}", address))?;
    let mut session = DeviceSession::establish(stream, mode, cipher).await?;
    eprintln!("Connected to {} ({})", address, ChallengeCipher::VARIANT);

    if command.is_empty() {
        interactive(&mut session).await
    } else {
        one_shot(&mut session, &command.join(" ")).await
    }
}

fn switch(name: &str) -> Result<bool> {
    match std::env::var(name).ok().as_deref() {
        None | Some("1") | Some("on") | Some("yes") | Some("true") => Ok(true),
        Some("0") | Some("off") | Some("no") | Some("false") => Ok(false),
        Some(other) => bail!("{} must be on or off, got {:?}", name, other),
    }
}

fn print_chunk(chunk: &[u8]) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(chunk);
    let _ = stdout.flush();
}

async fn interactive(session: &mut DeviceSession<TcpStream>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => session.send(&line).await?,
                None => return Ok(()),
            },
            chunk = session.recv() => match chunk? {
                Some(chunk) => print_chunk(&chunk),
                None => {
                    eprintln!("Device closed the connection");
                    return Ok(());
                }
            },
        }
    }
}

async fn one_shot(session: &mut DeviceSession<TcpStream>, command: &str) -> Result<()> {
    session.send(command).await?;

    loop {
        match timeout(IDLE_TIMEOUT, session.recv()).await {
            Ok(Ok(Some(chunk))) => print_chunk(&chunk),
            Ok(Ok(None)) | Err(_) => return Ok(()),
            Ok(Err(e)) => return Err(e),
        }
    }
}
