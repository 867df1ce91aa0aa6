// ABOUTME: Typed errors for log queries against the store and full nodes
// ABOUTME: Store and node failures pass through unchanged; only reorgs are retried

use alloy_primitives::B256;
use thiserror::Error;

/// Errors that can occur while answering a log query
#[derive(Debug, Error)]
pub enum Error {
    /// Block hash filter references a block the full node does not know
    #[error("unknown block {0}")]
    UnknownBlock(B256),

    /// Deadline passed while the store kept processing reorgs
    #[error("get logs timed out: reorg version kept changing")]
    ReorgTimeout,

    /// Deadline passed while a store or node call was still in flight
    #[error("get logs deadline exceeded")]
    DeadlineExceeded,

    /// Persistent log store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Full node failure
    #[error("Full node error: {0}")]
    FullNode(String),

    /// HTTP transport to a full node failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Full node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a full node error
    pub fn full_node(msg: impl Into<String>) -> Self {
        Self::FullNode(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for the errors caused by running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReorgTimeout | Self::DeadlineExceeded)
    }
}

/// Result type for log query operations
pub type Result<T> = std::result::Result<T, Error>;
