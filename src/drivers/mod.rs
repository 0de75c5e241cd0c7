//! Playback device transport
//!
//! The poller and the action dispatcher talk to the device only through the
//! [`Transport`] trait, so tests can substitute scripted transports.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod http;
pub mod status;

pub use http::HttpTransport;
pub use status::{ConnectionStatus, StatusCallback, StatusReporter};

/// HTTP verb used for a device command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Failure of a single device call
///
/// A non-2xx response is not an error by itself: its body is still parsed
/// and returned, and the transport reports a warning status instead.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network, DNS or timeout failure; no response was received
    #[error("network error: {0}")]
    Connection(String),
    /// A response arrived but its body is not JSON
    #[error("invalid JSON body (HTTP {status}): {message}")]
    Parse { status: u16, message: String },
}

/// One-shot request/response channel to the playback device
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one call against `path` and return the decoded JSON body
    ///
    /// An empty body decodes as `Value::Null`.
    async fn send_command(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
    ) -> Result<Value, TransportError>;
}
