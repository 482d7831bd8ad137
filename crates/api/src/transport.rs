//! Transport seam between the persistence client and the server.
//!
//! [`NavTransport`] is the only place the editor touches the network. The
//! production implementation is [`crate::HttpTransport`]; tests plug in an
//! in-memory server.

use std::fmt;

use thiserror::Error;

/// Name of the session cookie attached to every mutating request.
pub const SESSION_COOKIE: &str = "_session_id";

/// Mutating admin endpoints, relative to the project's rest base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    MountOrder,
    ConfigureToolGrouping,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::MountOrder => "admin/mount_order",
            Endpoint::ConfigureToolGrouping => "admin/configure_tool_grouping",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A failed exchange with the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }
}

/// Network operations the editor needs. One call is one request.
#[async_trait::async_trait]
pub trait NavTransport: Send + Sync {
    /// `GET _nav.json`, returning the raw body of a 2xx response.
    async fn fetch_snapshot(&self) -> Result<String, TransportError>;

    /// Form-encoded `POST` to an admin endpoint. Any non-2xx status is an error.
    async fn post_form(&self, endpoint: Endpoint, fields: &[(String, String)]) -> Result<(), TransportError>;

    /// Current value of the session cookie, read fresh on every call.
    fn session_id(&self) -> Option<String>;
}
