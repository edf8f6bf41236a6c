//! Connector seam between the transport supervisor and a concrete socket.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// WebSocket close code for a normal, client-initiated shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Everything needed to open one physical connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: Url,
    /// Full `Cookie` header value when the token travels as a cookie.
    pub cookie: Option<String>,
}

impl ConnectRequest {
    /// The URL without its query string, safe to log.
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("url", &self.redacted())
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Something read from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    Text(String),
    Close { code: Option<u16>, reason: String },
}

/// Write half of an open connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Closes with [`NORMAL_CLOSURE`].
    async fn close(&mut self) -> Result<()>;
}

/// Read half of an open connection.
///
/// `next_frame` must be cancel safe: the supervisor races it against
/// outbound writes and cancellation.
#[async_trait]
pub trait FrameStream: Send {
    /// `None` once the peer is gone.
    async fn next_frame(&mut self) -> Option<Result<WireEvent>>;
}

pub type Connection = (Box<dyn FrameSink>, Box<dyn FrameStream>);

/// Opens physical connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection>;
}
