//! Error types for the edge gatekeeper.

use thiserror::Error;

/// Error from the threat oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited")]
    RateLimited,

    /// Non-success status from the oracle.
    #[error("API request failed with status {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OracleError::Timeout
        } else {
            OracleError::Http(e)
        }
    }
}

/// Error from an approval store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// A stored record that is not a JSON value.
    #[error("Undecodable approval record {raw:?}: {source}")]
    Decode {
        raw: String,
        source: serde_json::Error,
    },

    #[error("Approval store lock poisoned")]
    Poisoned,
}

/// Error raised while deciding or forwarding a request.
#[derive(Error, Debug)]
pub enum GatekeeperError {
    #[error("Invalid {name} header: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Client IP header does not hold an IP address: {0:?}")]
    InvalidClientIp(String),

    #[error("Threat oracle failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Approval store failed: {0}")]
    Store(#[from] StoreError),

    #[error("Upstream request failed: {0}")]
    Upstream(#[source] anyhow::Error),
}
