//! # Error Types
//!
//! Infrastructure faults raised while executing a client statement.
//!
//! Backend errors are *not* represented here: a target that answers with an
//! error packet produces an [`ErrorResponse`](crate::backend::packet::ErrorResponse)
//! which the merger turns into the statement outcome. Only failures of the
//! proxy's own machinery (leasing, collection, transmission, routing,
//! configuration, cursor misuse) surface as [`ProxyError`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// No pooled connection became available within the lease timeout
    #[error("Timed out after {timeout_ms}ms leasing a connection for target '{target}'")]
    PoolTimeout { target: String, timeout_ms: u64 },

    /// The named target has no registered pool
    #[error("No connection pool registered for target '{target}'")]
    PoolUnavailable { target: String },

    /// The response collector deadline elapsed before every target answered
    #[error("Execution timed out: received {received} of {expected} backend responses")]
    ExecutionTimeout { expected: usize, received: usize },

    /// Opening a pooled connection to a target failed
    #[error("Failed to connect to target '{target}': {reason}")]
    Connect { target: String, reason: String },

    /// Writing a statement to a leased connection failed
    #[error("Failed to transmit statement to target '{target}': {reason}")]
    Transmit { target: String, reason: String },

    /// The read-merge strategy could not be built from the collected results
    #[error("Merge strategy error: {0}")]
    MergeStrategy(String),

    /// The cursor or handler was driven out of protocol
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProxyError {
    /// Whether this fault came from the connection leaser
    pub fn is_lease_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::PoolTimeout { .. } | ProxyError::PoolUnavailable { .. }
        )
    }
}

impl From<config::ConfigError> for ProxyError {
    fn from(error: config::ConfigError) -> Self {
        ProxyError::Configuration(error.to_string())
    }
}

pub type ProxyResult<T> = std::result::Result<T, ProxyError>;
