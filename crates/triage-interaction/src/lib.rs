//! Transport layer: the persistent conversation channel.
//!
//! - `transport`: Supervised connection with bounded reconnects (`Transport`)
//! - `connector`: Seam between the supervisor and a concrete socket
//! - `ws_connector`: WebSocket connector over `tokio-tungstenite`
//! - `socket_url`: Socket URL and token placement

pub mod connector;
pub mod error;
pub mod socket_url;
pub mod transport;
pub mod ws_connector;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use connector::{ConnectRequest, Connector, NORMAL_CLOSURE};
pub use error::TransportError;
pub use socket_url::SocketEndpoint;
pub use transport::{
    ConnectionHandle, ConnectionState, ConnectionStatus, Transport, TransportEvent,
    TransportEventKind, TransportOptions,
};
pub use ws_connector::TungsteniteConnector;
