//! Approval stores: keyed, expiring verdicts per client IP.

pub mod memory;
pub mod redis_store;

use crate::error::StoreError;
use crate::oracle::is_truthy;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Stored value some writers use for "no value". Read as a missing record.
const UNDEFINED_SENTINEL: &str = "undefined";

/// Trait for approval stores.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Fetch the verdict recorded for an IP.
    ///
    /// `Some(true)` approved, `Some(false)` denied, `None` no live record.
    async fn lookup(&self, ip: &str) -> Result<Option<bool>, StoreError>;

    /// Record a verdict for an IP, expiring after `ttl`.
    async fn record(&self, ip: &str, approved: bool, ttl: Duration) -> Result<(), StoreError>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

/// Serialize a verdict the way it is stored: JSON `true` or `false`.
pub fn encode_record(approved: bool) -> String {
    Value::Bool(approved).to_string()
}

/// Decode a stored record.
///
/// Any JSON value is accepted and read with loose truthiness. The literal
/// `undefined` is treated as a missing record, an empty value as a denial.
pub fn decode_record(raw: &str) -> Result<Option<bool>, StoreError> {
    if raw == UNDEFINED_SENTINEL {
        warn!(record = raw, "Suspect approval record, treating as absent");
        return Ok(None);
    }

    // An empty record is present but falsy.
    if raw.is_empty() {
        return Ok(Some(false));
    }

    let value: Value = serde_json::from_str(raw).map_err(|source| StoreError::Decode {
        raw: raw.to_string(),
        source,
    })?;

    Ok(Some(is_truthy(&value)))
}
