//! Connection status reporting
//!
//! The transport updates the status after every call; subscribers are only
//! notified when the status actually changes.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Connection status of the playback device
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Last call succeeded
    Ok,
    /// Device answered with a non-success HTTP status
    Warning(String),
    /// Device could not be reached
    ConnectionFailure(String),
    /// No call has completed yet
    Disconnected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Ok => write!(f, "ok"),
            ConnectionStatus::Warning(msg) => write!(f, "warning: {}", msg),
            ConnectionStatus::ConnectionFailure(msg) => write!(f, "connection failure: {}", msg),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Type alias for connection status callbacks
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Current status plus change subscribers
#[derive(Clone)]
pub struct StatusReporter {
    current: Arc<RwLock<ConnectionStatus>>,
    callbacks: Arc<RwLock<Vec<StatusCallback>>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(ConnectionStatus::Disconnected)),
            callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Current connection status
    pub fn current(&self) -> ConnectionStatus {
        self.current.read().clone()
    }

    /// Record a new status, notifying subscribers if it changed
    pub fn update(&self, status: ConnectionStatus) {
        {
            let mut current = self.current.write();
            if *current == status {
                return;
            }
            debug!("Connection status: {} → {}", *current, status);
            *current = status.clone();
        }

        for callback in self.callbacks.read().iter() {
            callback(status.clone());
        }
    }

    /// Subscribe to status changes
    pub fn subscribe(&self, callback: StatusCallback) {
        self.callbacks.write().push(callback);
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}
