//! In-memory connector for tests.
//!
//! Each accepted connection hands a [`MemoryPeer`] to the test, which plays
//! the server side: push frames in, read what the client wrote, close.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::connector::{
    ConnectRequest, Connection, Connector, FrameSink, FrameStream, NORMAL_CLOSURE, WireEvent,
};
use crate::error::{Result, TransportError};

/// What the client did on a memory connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    Text(String),
    Closed(u16),
}

/// Server side of one accepted memory connection.
pub struct MemoryPeer {
    pub request: ConnectRequest,
    to_client: mpsc::UnboundedSender<WireEvent>,
    from_client: mpsc::UnboundedReceiver<PeerMessage>,
}

impl MemoryPeer {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(WireEvent::Text(text.into()));
    }

    pub fn close_with(&self, code: u16) {
        let _ = self.to_client.send(WireEvent::Close {
            code: Some(code),
            reason: String::new(),
        });
    }

    /// Next thing the client wrote, `None` once the client side is gone.
    pub async fn next_message(&mut self) -> Option<PeerMessage> {
        self.from_client.recv().await
    }

    /// Next text frame, skipping anything else.
    pub async fn next_text(&mut self) -> Option<String> {
        loop {
            match self.next_message().await? {
                PeerMessage::Text(text) => return Some(text),
                PeerMessage::Closed(_) => {}
            }
        }
    }
}

#[derive(Default)]
struct Script {
    refuse_next: usize,
    refuse_all: bool,
    attempts: Vec<ConnectRequest>,
}

/// Connector that accepts by default and can be told to refuse.
#[derive(Clone)]
pub struct MemoryConnector {
    script: Arc<Mutex<Script>>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Returns the connector and the stream of accepted peers.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Arc::new(Mutex::new(Script::default())),
            peers,
        };
        (connector, peers_rx)
    }

    pub fn refuse_next(&self, count: usize) {
        if let Ok(mut script) = self.script.lock() {
            script.refuse_next = count;
        }
    }

    pub fn refuse_all(&self) {
        if let Ok(mut script) = self.script.lock() {
            script.refuse_all = true;
        }
    }

    pub fn accept_all(&self) {
        if let Ok(mut script) = self.script.lock() {
            script.refuse_all = false;
            script.refuse_next = 0;
        }
    }

    pub fn connect_count(&self) -> usize {
        self.script.lock().map(|s| s.attempts.len()).unwrap_or(0)
    }

    pub fn attempts(&self) -> Vec<ConnectRequest> {
        self.script
            .lock()
            .map(|s| s.attempts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection> {
        let refuse = {
            let mut script = self
                .script
                .lock()
                .map_err(|_| TransportError::Connect("script poisoned".into()))?;
            script.attempts.push(request.clone());
            if script.refuse_next > 0 {
                script.refuse_next -= 1;
                true
            } else {
                script.refuse_all
            }
        };
        if refuse {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (to_client, client_inbox) = mpsc::unbounded_channel();
        let (client_outbox, from_client) = mpsc::unbounded_channel();
        let _ = self.peers.send(MemoryPeer {
            request: request.clone(),
            to_client,
            from_client,
        });

        Ok((
            Box::new(MemorySink {
                outbox: client_outbox,
            }),
            Box::new(MemoryStream {
                inbox: client_inbox,
            }),
        ))
    }
}

struct MemorySink {
    outbox: mpsc::UnboundedSender<PeerMessage>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.outbox
            .send(PeerMessage::Text(text))
            .map_err(|_| TransportError::Socket("peer gone".into()))
    }

    async fn close(&mut self) -> Result<()> {
        self.outbox
            .send(PeerMessage::Closed(NORMAL_CLOSURE))
            .map_err(|_| TransportError::Socket("peer gone".into()))
    }
}

struct MemoryStream {
    inbox: mpsc::UnboundedReceiver<WireEvent>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<WireEvent>> {
        self.inbox.recv().await.map(Ok)
    }
}
