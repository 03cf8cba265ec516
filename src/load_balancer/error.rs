//! Errors produced by the backend registry and the scheduler.

use thiserror::Error;

/// Load balancer error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LbError {
    /// A weight below zero was supplied.
    #[error("invalid weight {0}: weights must be non-negative")]
    InvalidWeight(i64),

    /// The address is not registered in the pool.
    #[error("server {0} not found")]
    ServerNotFound(String),

    /// The pool is empty or every backend has weight 0.
    #[error("no available servers")]
    NoAvailableServers,

    /// Invalid construction arguments.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The address cannot be used as a backend target.
    #[error("invalid backend address {0}")]
    InvalidAddress(String),
}
