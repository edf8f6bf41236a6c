//! `tokio-tungstenite` implementation of the connector seam.

use std::borrow::Cow;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::connector::{ConnectRequest, Connection, Connector, FrameSink, FrameStream, WireEvent};
use crate::error::{Result, TransportError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over WebSocket, plain or TLS depending on the URL scheme.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Connection> {
        let mut upgrade = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        if let Some(cookie) = &request.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| TransportError::InvalidUrl(format!("cookie: {}", e)))?;
            upgrade.headers_mut().insert(COOKIE, value);
        }

        let (socket, response) = tokio_tungstenite::connect_async(upgrade)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(
            "[TungsteniteConnector] Upgraded {} ({})",
            request.redacted(),
            response.status()
        );

        let (sink, stream) = socket.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsStream { stream })))
    }
}

struct WsSink {
    sink: SplitSink<Socket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed("client closing"),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))?;
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }
}

struct WsStream {
    stream: SplitStream<Socket>,
}

#[async_trait]
impl FrameStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<WireEvent>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::Socket(e.to_string()))),
            };

            match message {
                Message::Text(text) => return Some(Ok(WireEvent::Text(text))),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(WireEvent::Text(text))),
                    Err(_) => {
                        tracing::warn!("[TungsteniteConnector] Dropping non-UTF-8 binary frame");
                    }
                },
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Some(Ok(WireEvent::Close { code, reason }));
                }
                // Pings are answered by tungstenite on the next write.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}
