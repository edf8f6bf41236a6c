//! Derivation of the conversation socket URL.
//!
//! The configured base may be an absolute `ws(s)://` URL, an absolute
//! `http(s)://` URL (converted to `ws(s)://`) or a path relative to the
//! portal origin. The session path `chat/ws/{sessionId}` is appended.

use triage_core::config::TokenPlacement;
use url::Url;

use crate::connector::ConnectRequest;
use crate::error::{Result, TransportError};

/// Where and how to reach the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEndpoint {
    pub base: String,
    pub portal_origin: Option<String>,
    pub token_placement: TokenPlacement,
}

impl SocketEndpoint {
    /// Builds the connect request for one session.
    pub fn request_for(&self, session_id: &str, token: &str) -> Result<ConnectRequest> {
        let mut url = resolve_base(&self.base, self.portal_origin.as_deref())?;

        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(format!("{} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(["chat", "ws", session_id]);

        let cookie = match self.token_placement {
            TokenPlacement::QueryParam => {
                url.query_pairs_mut().append_pair("token", token);
                None
            }
            TokenPlacement::Cookie => Some(format!("access_token={}", token)),
        };

        Ok(ConnectRequest { url, cookie })
    }
}

fn resolve_base(base: &str, portal_origin: Option<&str>) -> Result<Url> {
    let base = base.trim();
    let mut url = match Url::parse(base) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let origin = portal_origin.ok_or_else(|| {
                TransportError::InvalidUrl(format!(
                    "relative socket base '{}' needs a portal origin",
                    base
                ))
            })?;
            Url::parse(origin)?.join(base)?
        }
        Err(e) => return Err(e.into()),
    };

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidUrl(format!("cannot switch {} to {}", url, scheme)))?;
    Ok(url)
}
