use std::time::Duration;

use thiserror::Error;

/// Failures of the gossip topic plumbing.
///
/// Everything except [`GossipError::Cancelled`] ends the task that hit it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GossipError {
    #[error("failed to join topic {topic}: {reason}")]
    Join { topic: String, reason: String },

    #[error("failed to subscribe to topic {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("failed to publish on topic {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("topic channel closed")]
    ChannelClosed,

    #[error("subscription delivery failed: {0}")]
    Delivery(String),

    #[error("gossip task failed: {0}")]
    Task(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl GossipError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GossipError::Cancelled)
    }
}

/// Failures of a point-to-point transaction fetch.
///
/// All of them are local to one transaction id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("peer does not have the transaction")]
    NotFound,

    #[error("peer is not reachable")]
    Disconnected,

    #[error("request failed: {0}")]
    Request(String),

    #[error("gave up after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::NotFound => "not_found",
            FetchError::Disconnected => "disconnected",
            FetchError::Request(_) => "error",
            FetchError::Exhausted { .. } => "exhausted",
            FetchError::Cancelled => "cancelled",
        }
    }
}
