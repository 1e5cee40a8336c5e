//! One connection: gate, line framing and command execution

use anyhow::{Context, Result};
use ecmd_shared::{AuthGate, ChallengeCipher, ChannelError, ChannelMode, GateAction, GateEvent, LineDecoder};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ConnectionId;
use crate::command::{CommandDispatcher, DeviceContext, SystemRequest};
use crate::transport::TransportStream;

const READ_BUF_LEN: usize = 512;
const PARSE_ERROR_LINE: &[u8] = b"parse error\n";

/// State every session of a server shares
#[derive(Clone)]
pub struct SessionShared {
    pub mode: ChannelMode,
    pub cipher: Arc<ChallengeCipher>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub context: Arc<Mutex<DeviceContext>>,
    pub max_line_len: usize,
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the transport
    PeerClosed,
    /// Gate aborted the connection
    Aborted(ChannelError),
    /// A command asked for a reset or the bootloader
    Requested(SystemRequest),
}

pub struct Session<S: TransportStream> {
    id: ConnectionId,
    stream: S,
    gate: AuthGate,
    decoder: LineDecoder,
    dispatcher: Arc<CommandDispatcher>,
    context: Arc<Mutex<DeviceContext>>,
    rng: Box<dyn RngCore + Send>,
}

impl<S: TransportStream> Session<S> {
    pub fn new(id: ConnectionId, stream: S, shared: &SessionShared) -> Self {
        Self {
            id,
            stream,
            gate: AuthGate::new(shared.mode, shared.cipher.clone()),
            decoder: LineDecoder::new(shared.max_line_len),
            dispatcher: shared.dispatcher.clone(),
            context: shared.context.clone(),
            rng: Box::new(OsRng),
        }
    }

    /// Replace the random source (challenges and IVs)
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Run until the peer leaves, the gate aborts or a command ends the device
    pub async fn run(mut self) -> Result<SessionEnd> {
        let actions = self.gate.handle(GateEvent::Connect, self.rng.as_mut());
        if let Some(end) = self.apply(actions).await? {
            return Ok(end);
        }

        let mut buf = [0u8; READ_BUF_LEN];
        loop {
            let n = self
                .stream
                .read(&mut buf)
                .await
                .with_context(|| format!("{} read failed", self.id))?;

            if n == 0 {
                self.gate.handle(GateEvent::Close, self.rng.as_mut());
                return Ok(SessionEnd::PeerClosed);
            }

            let actions = self.gate.handle(GateEvent::Data(&buf[..n]), self.rng.as_mut());
            if let Some(end) = self.apply(actions).await? {
                return Ok(end);
            }
        }
    }

    async fn apply(&mut self, actions: Vec<GateAction>) -> Result<Option<SessionEnd>> {
        for action in actions {
            match action {
                GateAction::Send(bytes) => {
                    self.stream.write_all(&bytes).await?;
                }
                GateAction::Ready => {
                    info!("{} channel ready", self.id);
                }
                GateAction::Deliver(bytes) => {
                    self.decoder.extend(&bytes);
                    if let Some(request) = self.drain_lines().await? {
                        if let Err(e) = TransportStream::shutdown(&mut self.stream).await {
                            debug!("{} shutdown failed: {}", self.id, e);
                        }
                        return Ok(Some(SessionEnd::Requested(request)));
                    }
                }
                GateAction::Abort(reason) => {
                    warn!("{} aborted: {}", self.id, reason);
                    // the stream is dropped with the session
                    if let Err(e) = self.stream.abort() {
                        debug!("{} abortive close failed: {}", self.id, e);
                    }
                    return Ok(Some(SessionEnd::Aborted(reason)));
                }
            }
        }
        Ok(None)
    }

    async fn drain_lines(&mut self) -> Result<Option<SystemRequest>> {
        loop {
            match self.decoder.next_line() {
                Ok(Some(line)) => {
                    if let Some(request) = self.execute(&line).await? {
                        return Ok(Some(request));
                    }
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    warn!("{} rejected line: {}", self.id, e);
                    self.send(PARSE_ERROR_LINE).await?;
                }
            }
        }
    }

    /// Dispatch one line, re-running it while the handler continues
    async fn execute(&mut self, line: &str) -> Result<Option<SystemRequest>> {
        loop {
            let (outcome, request) = {
                let mut ctx = self.context.lock().await;
                let outcome = self.dispatcher.dispatch(&mut ctx, self.id, line);
                (outcome, ctx.take_request())
            };

            self.send(&outcome.to_wire()).await?;

            if request.is_some() {
                return Ok(request);
            }
            if !outcome.is_continue() {
                return Ok(None);
            }
            tokio::task::yield_now().await;
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let sealed = self.gate.seal(payload, self.rng.as_mut())?;
        self.stream.write_all(&sealed).await?;
        Ok(())
    }
}
