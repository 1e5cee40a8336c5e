//! Device server: configuration, accept loop and session bookkeeping

use anyhow::{bail, Context, Result};
use ecmd_shared::codec::MAX_LINE_LEN;
use ecmd_shared::handshake::DEFAULT_PORT;
use ecmd_shared::{ChallengeCipher, ChannelMode, SharedKey};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::session::{Session, SessionEnd, SessionShared};
use super::ConnectionId;
use crate::command::{CommandDispatcher, CommandTable, DeviceContext, SystemRequest};
use crate::transport::TransportAcceptor;

/// Default size of one response chunk
pub const DEFAULT_RESPONSE_CAPACITY: usize = 128;

/// Configuration for the device server
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Address the command service listens on
    pub listen: String,
    /// Authentication and encryption switches
    pub mode: ChannelMode,
    /// Pre-shared key for the challenge exchange
    pub key: SharedKey,
    /// Upper bound of every response chunk
    pub response_capacity: usize,
    /// Longest accepted command line
    pub max_line_len: usize,
    /// Persist configuration here; in memory when unset
    pub store_path: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", DEFAULT_PORT),
            mode: ChannelMode::default(),
            key: SharedKey::default(),
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
            max_line_len: MAX_LINE_LEN,
            store_path: None,
        }
    }
}

impl DeviceConfig {
    /// Defaults overlaid with `ECMD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(listen) = lookup("ECMD_LISTEN") {
            config.listen = listen;
        }
        if let Some(key) = lookup("ECMD_KEY") {
            config.key = SharedKey::from_slice(key.as_bytes()).context("Invalid ECMD_KEY")?;
        }
        if let Some(value) = lookup("ECMD_AUTH") {
            config.mode.authenticate = parse_switch(&value).context("Invalid ECMD_AUTH")?;
        }
        if let Some(value) = lookup("ECMD_ENCRYPT") {
            config.mode.encrypt = parse_switch(&value).context("Invalid ECMD_ENCRYPT")?;
        }
        if let Some(path) = lookup("ECMD_STORE") {
            config.store_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("ECMD_RESPONSE_CAPACITY") {
            let capacity: usize = value
                .parse()
                .with_context(|| format!("Invalid ECMD_RESPONSE_CAPACITY: {:?}", value))?;
            if capacity == 0 {
                bail!("ECMD_RESPONSE_CAPACITY must be positive");
            }
            config.response_capacity = capacity;
        }

        Ok(config)
    }
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" | "true" => Ok(true),
        "0" | "off" | "no" | "false" => Ok(false),
        other => bail!("expected on/off, got {:?}", other),
    }
}

/// Accepts peers and runs a [`Session`] for each of them
pub struct DeviceServer {
    config: DeviceConfig,
    shared: SessionShared,
    next_id: AtomicU64,
}

impl DeviceServer {
    pub fn new(config: DeviceConfig, context: DeviceContext) -> Result<Self> {
        let cipher = ChallengeCipher::new(&config.key).context("Failed to key challenge cipher")?;
        let dispatcher = CommandDispatcher::new(
            Arc::new(CommandTable::standard()),
            config.response_capacity,
        );

        let shared = SessionShared {
            mode: config.mode,
            cipher: Arc::new(cipher),
            dispatcher: Arc::new(dispatcher),
            context: Arc::new(Mutex::new(context)),
            max_line_len: config.max_line_len,
        };

        Ok(Self {
            config,
            shared,
            next_id: AtomicU64::new(0),
        })
    }

    /// Handle to the device state, e.g. for simulation tasks
    pub fn context(&self) -> Arc<Mutex<DeviceContext>> {
        self.shared.context.clone()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Serve until a command requests a reset/bootloader or Ctrl-C
    ///
    /// Returns the request that stopped the server, if any.
    pub async fn run<A: TransportAcceptor>(self, acceptor: A) -> Result<Option<SystemRequest>> {
        info!(
            "Serving commands over {} (auth={}, encrypt={}, cipher={}, {} commands, {}-byte responses)",
            acceptor.name(),
            self.config.mode.authenticate,
            self.config.mode.encrypt,
            ChallengeCipher::VARIANT,
            self.shared.dispatcher.table().len(),
            self.shared.dispatcher.capacity()
        );

        let (request_tx, mut request_rx) = mpsc::channel::<SystemRequest>(4);

        loop {
            tokio::select! {
                accepted = acceptor.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = self.next_connection_id();
                        info!("{} connected from {}", id, peer);
                        let session = Session::new(id, stream, &self.shared);
                        let context = self.shared.context.clone();
                        let requests = request_tx.clone();
                        tokio::spawn(async move {
                            let end = session.run().await;
                            context.lock().await.release_connection(id);
                            match end {
                                Ok(SessionEnd::PeerClosed) => info!("{} closed", id),
                                Ok(SessionEnd::Aborted(reason)) => warn!("{} dropped: {}", id, reason),
                                Ok(SessionEnd::Requested(request)) => {
                                    info!("{} requested {}", id, request);
                                    let _ = requests.send(request).await;
                                }
                                Err(e) => warn!("{} session error: {:#}", id, e),
                            }
                        });
                    }
                    Err(e) => error!("Accept failed: {:#}", e),
                },
                Some(request) = request_rx.recv() => {
                    debug!("Stopping for {}", request);
                    return Ok(Some(request));
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    return Ok(None);
                }
            }
        }
    }
}
