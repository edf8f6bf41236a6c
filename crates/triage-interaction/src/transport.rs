//! Supervised, reconnecting conversation channel.
//!
//! One [`Transport`] owns at most one live connection. Each physical
//! connection lifetime gets a new generation number; a supervisor task per
//! generation connects, pumps frames and reconnects with a bounded linear
//! backoff. Consumers read [`TransportEvent`]s from a single ordered channel
//! and observe [`ConnectionState`] through a `watch` receiver.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use triage_core::config::{ReconnectPolicy, TriageConfig};

use crate::connector::{ConnectRequest, Connector, FrameSink, FrameStream, WireEvent};
use crate::error::{Result, TransportError};
use crate::socket_url::SocketEndpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    /// Reconnect attempts exhausted; only a manual retry leaves this state.
    Failed,
}

/// Identifies one physical connection lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    pub session_id: String,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Opened,
    /// One raw inbound text frame.
    Frame(String),
    /// The socket closed or a connect attempt failed.
    Closed { code: Option<u16>, reason: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Reconnects exhausted after `attempts` tries.
    Failed { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub handle: ConnectionHandle,
    pub kind: TransportEventKind,
}

struct OutboundRequest {
    text: String,
    ack: oneshot::Sender<bool>,
}

/// The value published on the state watch.
///
/// While `Open` it also carries the write path of the live socket; the
/// write path is dropped as soon as the socket goes away, so nothing sent
/// afterwards can be queued for a later connection.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    generation: u64,
    state: ConnectionState,
    writer: Option<mpsc::UnboundedSender<OutboundRequest>>,
}

impl ConnectionStatus {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

/// Static settings for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub endpoint: SocketEndpoint,
    pub reconnect: ReconnectPolicy,
}

impl TransportOptions {
    pub fn from_config(config: &TriageConfig) -> Self {
        Self {
            endpoint: SocketEndpoint {
                base: config.socket_base().to_string(),
                portal_origin: config.portal_origin.clone(),
                token_placement: config.token_placement,
            },
            reconnect: config.reconnect.clone(),
        }
    }
}

struct ActiveConnection {
    handle: ConnectionHandle,
    token: String,
    cancel: CancellationToken,
}

pub struct Transport {
    connector: Arc<dyn Connector>,
    options: TransportOptions,
    events: mpsc::UnboundedSender<TransportEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    next_generation: u64,
    active: Option<ActiveConnection>,
}

impl Transport {
    /// Creates a transport and the receiving end of its event channel.
    pub fn new(
        connector: Arc<dyn Connector>,
        options: TransportOptions,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ConnectionStatus {
            generation: 0,
            state: ConnectionState::Disconnected,
            writer: None,
        });
        let transport = Self {
            connector,
            options,
            events,
            status: Arc::new(status),
            next_generation: 1,
            active: None,
        };
        (transport, events_rx)
    }

    /// Opens the channel for `session_id`.
    ///
    /// A no-op returning the existing handle while the same session is
    /// connecting or open. A different session tears the old connection
    /// down first.
    pub fn open(&mut self, session_id: &str, token: Option<&str>) -> Result<ConnectionHandle> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TransportError::MissingToken)?;

        if let Some(active) = &self.active
            && active.handle.session_id == session_id
            && matches!(
                self.state(),
                ConnectionState::Connecting | ConnectionState::Open
            )
        {
            tracing::debug!(
                "[Transport] open({}) ignored, generation {} already live",
                session_id,
                active.handle.generation
            );
            return Ok(active.handle.clone());
        }

        // Build the request before tearing anything down so a bad URL
        // leaves the current connection alone.
        let request = self.options.endpoint.request_for(session_id, token)?;
        self.teardown();
        Ok(self.spawn_connection(session_id.to_string(), token.to_string(), request))
    }

    /// Sends one text frame. Returns false when the handle is stale or the
    /// connection is not open; nothing is ever queued.
    pub async fn send(&self, handle: &ConnectionHandle, text: impl Into<String>) -> bool {
        let writer = {
            let status = self.status.borrow();
            if status.generation != handle.generation || status.state != ConnectionState::Open {
                tracing::warn!(
                    "[Transport] send on generation {} rejected (current {}, {:?})",
                    handle.generation,
                    status.generation,
                    status.state
                );
                return false;
            }
            status.writer.clone()
        };
        let Some(writer) = writer else {
            return false;
        };

        let (ack, ack_rx) = oneshot::channel();
        if writer
            .send(OutboundRequest {
                text: text.into(),
                ack,
            })
            .is_err()
        {
            tracing::warn!("[Transport] send failed, socket already gone");
            return false;
        }
        ack_rx.await.unwrap_or(false)
    }

    /// Closes the connection identified by `handle`, if it is still current.
    pub fn close(&mut self, handle: &ConnectionHandle) {
        if self.is_current(handle) {
            self.teardown();
        }
    }

    /// Starts a fresh connection for the current session with a reset
    /// retry counter.
    pub fn retry(&mut self) -> Result<ConnectionHandle> {
        let active = self.active.as_ref().ok_or(TransportError::NothingToRetry)?;
        let session_id = active.handle.session_id.clone();
        let token = active.token.clone();
        tracing::info!("[Transport] Manual retry for session {}", session_id);

        let request = self.options.endpoint.request_for(&session_id, &token)?;
        self.teardown();
        Ok(self.spawn_connection(session_id, token, request))
    }

    /// Tears down whatever is live. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn current_handle(&self) -> Option<&ConnectionHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }

    pub fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.active.as_ref().is_some_and(|a| &a.handle == handle)
    }

    fn spawn_connection(
        &mut self,
        session_id: String,
        token: String,
        request: ConnectRequest,
    ) -> ConnectionHandle {
        let handle = ConnectionHandle {
            session_id,
            generation: self.next_generation,
        };
        self.next_generation += 1;

        self.status.send_replace(ConnectionStatus {
            generation: handle.generation,
            state: ConnectionState::Connecting,
            writer: None,
        });

        let cancel = CancellationToken::new();
        let supervisor = Supervisor {
            handle: handle.clone(),
            request,
            policy: self.options.reconnect.clone(),
            connector: Arc::clone(&self.connector),
            events: self.events.clone(),
            status: Arc::clone(&self.status),
            cancel: cancel.clone(),
        };
        tracing::info!(
            "[Transport] Opening session {} (generation {})",
            handle.session_id,
            handle.generation
        );
        tokio::spawn(supervisor.run());

        self.active = Some(ActiveConnection {
            handle: handle.clone(),
            token,
            cancel,
        });
        handle
    }

    fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        // Cancelling first detaches event delivery before the socket closes.
        active.cancel.cancel();
        let generation = active.handle.generation;
        self.status.send_if_modified(|status| {
            if status.generation == generation && status.state != ConnectionState::Disconnected {
                status.state = ConnectionState::Closing;
                status.writer = None;
                true
            } else {
                false
            }
        });
        tracing::info!(
            "[Transport] Closed session {} (generation {})",
            active.handle.session_id,
            generation
        );
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.teardown();
    }
}

enum PumpEnd {
    Cancelled,
    Closed { code: Option<u16>, reason: String },
}

/// Drives one generation: connect, pump, reconnect.
struct Supervisor {
    handle: ConnectionHandle,
    request: ConnectRequest,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<TransportEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(self) {
        let mut attempts: u32 = 0;

        loop {
            self.publish(ConnectionState::Connecting, None);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.publish(ConnectionState::Disconnected, None);
                    return;
                }
                result = self.connector.connect(&self.request) => result,
            };

            let (code, reason) = match connected {
                Ok((sink, stream)) => {
                    attempts = 0;
                    let (writer, outbound) = mpsc::unbounded_channel();
                    self.publish(ConnectionState::Open, Some(writer));
                    tracing::info!(
                        "[Transport] Connected {} (generation {})",
                        self.request.redacted(),
                        self.handle.generation
                    );
                    self.emit(TransportEventKind::Opened);

                    match self.pump(sink, stream, outbound).await {
                        PumpEnd::Cancelled => {
                            self.publish(ConnectionState::Disconnected, None);
                            return;
                        }
                        PumpEnd::Closed { code, reason } => (code, reason),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "[Transport] Connect to {} failed: {}",
                        self.request.redacted(),
                        e
                    );
                    (None, e.to_string())
                }
            };

            self.publish(ConnectionState::Disconnected, None);
            self.emit(TransportEventKind::Closed { code, reason });

            if attempts >= self.policy.max_attempts {
                tracing::error!(
                    "[Transport] Giving up on session {} after {} reconnect attempt(s)",
                    self.handle.session_id,
                    attempts
                );
                self.publish(ConnectionState::Failed, None);
                self.emit(TransportEventKind::Failed { attempts });
                return;
            }

            attempts += 1;
            let delay = self.policy.delay_for(attempts);
            tracing::info!(
                "[Transport] Reconnect {}/{} in {:?}",
                attempts,
                self.policy.max_attempts,
                delay
            );
            self.emit(TransportEventKind::ReconnectScheduled {
                attempt: attempts,
                delay,
            });

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.publish(ConnectionState::Disconnected, None);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn pump(
        &self,
        mut sink: Box<dyn FrameSink>,
        mut stream: Box<dyn FrameStream>,
        mut outbound: mpsc::UnboundedReceiver<OutboundRequest>,
    ) -> PumpEnd {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!("[Transport] Close handshake failed: {}", e);
                    }
                    return PumpEnd::Cancelled;
                }

                Some(request) = outbound.recv() => {
                    match sink.send_text(request.text).await {
                        Ok(()) => {
                            let _ = request.ack.send(true);
                        }
                        Err(e) => {
                            tracing::warn!("[Transport] Write failed: {}", e);
                            let _ = request.ack.send(false);
                            return PumpEnd::Closed { code: None, reason: e.to_string() };
                        }
                    }
                }

                frame = stream.next_frame() => match frame {
                    Some(Ok(WireEvent::Text(text))) => {
                        tracing::debug!("[Transport] Frame ({} bytes)", text.len());
                        self.emit(TransportEventKind::Frame(text));
                    }
                    Some(Ok(WireEvent::Close { code, reason })) => {
                        tracing::info!("[Transport] Server closed: {:?} {}", code, reason);
                        return PumpEnd::Closed { code, reason };
                    }
                    Some(Err(e)) => {
                        tracing::warn!("[Transport] Read failed: {}", e);
                        return PumpEnd::Closed { code: None, reason: e.to_string() };
                    }
                    None => {
                        return PumpEnd::Closed { code: None, reason: "connection lost".to_string() };
                    }
                },
            }
        }
    }

    /// Publishes state for this generation only.
    fn publish(
        &self,
        state: ConnectionState,
        writer: Option<mpsc::UnboundedSender<OutboundRequest>>,
    ) {
        let generation = self.handle.generation;
        self.status.send_if_modified(|status| {
            if status.generation != generation {
                return false;
            }
            status.state = state;
            status.writer = writer;
            true
        });
    }

    fn emit(&self, kind: TransportEventKind) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.events.send(TransportEvent {
            handle: self.handle.clone(),
            kind,
        });
    }
}
