use serde_json::Value;
use thiserror::Error;

use crate::store::StorageError;

/// Coarse failure category, for callers that branch without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// No HTTP response was obtained at all.
    Network,
    /// Gateway answered 502/503/504 on behalf of the backend.
    Gateway,
    /// Backend rejected the bearer token (HTTP 401).
    Auth,
    /// Other 4xx response.
    Client,
    /// Other 5xx response.
    Server,
    /// Response body could not be interpreted.
    Parse,
    /// Login reply unusable (rejected or tokenless).
    Login,
    /// Session persistence failed.
    Storage,
    /// Client-side configuration problem (URL, TLS, builder).
    Config,
}

/// Top-level error type for the `clinica-api` crate.
///
/// Every terminal failure of [`ApiClient`](crate::ApiClient) surfaces as one
/// of these variants. The retryable ones (`Network`, `Gateway`) are only
/// returned after the retry budget of an idempotent request is spent.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connectivity ────────────────────────────────────────────────
    /// The request never produced a response (DNS, refused, reset, timeout).
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: reqwest::Error,
    },

    /// 502/503/504 from the gateway in front of the backend.
    #[error("{message} (HTTP {status})")]
    Gateway { status: u16, message: String },

    // ── Authentication ──────────────────────────────────────────────
    /// HTTP 401. The local session has already been torn down.
    #[error("Session expired: {message}")]
    Authentication { message: String },

    /// The login endpoint answered with a non-success status.
    #[error("Login rejected (HTTP {status}): {message}")]
    LoginRejected { status: u16, message: String },

    /// The login endpoint answered 2xx but carried no usable token.
    #[error("Login response did not contain a valid token")]
    MissingToken,

    // ── Backend replies ─────────────────────────────────────────────
    /// Terminal 4xx reply.
    #[error("Request failed (HTTP {status}): {message}")]
    Client {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// Terminal 5xx reply.
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// Canonical payload did not match the type the caller asked for.
    #[error("Parse error: {message}")]
    Parse { message: String, body: String },

    // ── Local ───────────────────────────────────────────────────────
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failed to build the underlying HTTP client.
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl Error {
    /// Build a terminal 4xx/5xx error from a status code.
    pub(crate) fn from_status(status: u16, message: String, body: Option<Value>) -> Self {
        if status < 500 {
            Self::Client {
                status,
                message,
                body,
            }
        } else {
            Self::Server {
                status,
                message,
                body,
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Gateway { .. } => ErrorKind::Gateway,
            Self::Authentication { .. } => ErrorKind::Auth,
            Self::LoginRejected { .. } | Self::MissingToken => ErrorKind::Login,
            Self::Client { .. } => ErrorKind::Client,
            Self::Server { .. } => ErrorKind::Server,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Storage(_) => ErrorKind::Storage,
            Self::InvalidUrl(_) | Self::HttpClient(_) => ErrorKind::Config,
        }
    }

    /// HTTP status behind this error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Gateway { status, .. }
            | Self::LoginRejected { status, .. }
            | Self::Client { status, .. }
            | Self::Server { status, .. } => Some(*status),
            Self::Authentication { .. } => Some(401),
            _ => None,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Gateway)
    }

    /// Returns `true` if the backend invalidated the session.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a "not found" reply.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The parsed error body the backend sent, if any.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Client { body, .. } | Self::Server { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

// ── Status message table ────────────────────────────────────────────

/// Human-readable fallback for a status code when the server sent no text.
pub fn status_message(status: u16) -> String {
    match status {
        500 => "Internal server error. If it persists, contact the administrator.".into(),
        502 => "The server is not available right now (Bad Gateway). It may be restarting.".into(),
        503 => "The server is temporarily out of service. Try again in a few moments.".into(),
        504 => "The server took too long to respond (Gateway Timeout). Try again.".into(),
        other => format!("HTTP {other} error from server"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_covers_gateway_codes() {
        assert!(status_message(502).contains("Bad Gateway"));
        assert!(status_message(503).contains("temporarily"));
        assert!(status_message(504).contains("Gateway Timeout"));
        assert_eq!(status_message(418), "HTTP 418 error from server");
    }

    #[test]
    fn from_status_splits_client_and_server() {
        let client = Error::from_status(404, "missing".into(), None);
        assert_eq!(client.kind(), ErrorKind::Client);
        assert!(client.is_not_found());

        let server = Error::from_status(500, "boom".into(), None);
        assert_eq!(server.kind(), ErrorKind::Server);
        assert_eq!(server.status(), Some(500));
        assert!(!server.is_retryable());
    }

    #[test]
    fn gateway_is_retryable_and_auth_is_not() {
        let gw = Error::Gateway {
            status: 503,
            message: status_message(503),
        };
        assert!(gw.is_retryable());
        assert_eq!(gw.kind().as_ref(), "gateway");

        let auth = Error::Authentication {
            message: "token revoked".into(),
        };
        assert!(!auth.is_retryable());
        assert!(auth.is_auth_expired());
        assert_eq!(auth.status(), Some(401));
    }
}
