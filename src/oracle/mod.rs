//! Threat oracle: the external reputation service consulted for unknown IPs.

pub mod ipdata;

use crate::error::OracleError;
use async_trait::async_trait;
use serde_json::Value;
use std::net::IpAddr;

/// Threat signals reported by the oracle. Any one of them raised marks the IP
/// as a threat.
pub const THREAT_FLAGS: [&str; 9] = [
    "is_tor",
    "is_icloud_relay",
    "is_proxy",
    "is_datacenter",
    "is_anonymous",
    "is_known_attacker",
    "is_known_abuser",
    "is_threat",
    "is_bogon",
];

/// Verdict of a single oracle lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreatVerdict {
    signals: Vec<&'static str>,
}

impl ThreatVerdict {
    /// A verdict with no threat signal raised.
    pub fn clean() -> Self {
        Self::default()
    }

    /// A verdict with the given signals raised. Unknown names are ignored.
    pub fn with_signals(names: &[&str]) -> Self {
        let signals = THREAT_FLAGS
            .iter()
            .copied()
            .filter(|flag| names.contains(flag))
            .collect();
        Self { signals }
    }

    /// Build a verdict from the oracle's JSON body.
    ///
    /// Flags use loose truthiness: a flag is raised when present and not
    /// `false`, `0`, `""` or `null`.
    pub fn from_json(body: &Value) -> Result<Self, OracleError> {
        let object = body.as_object().ok_or_else(|| {
            OracleError::InvalidResponse(format!("expected a JSON object, got {}", body))
        })?;

        let signals = THREAT_FLAGS
            .iter()
            .copied()
            .filter(|flag| object.get(*flag).is_some_and(is_truthy))
            .collect();

        Ok(Self { signals })
    }

    pub fn is_threat(&self) -> bool {
        !self.signals.is_empty()
    }

    /// Names of the raised signals, in [`THREAT_FLAGS`] order.
    pub fn signals(&self) -> &[&'static str] {
        &self.signals
    }
}

/// Loose truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Trait for threat oracles.
#[async_trait]
pub trait ThreatOracle: Send + Sync {
    /// Look up the threat signals for an IP address.
    async fn classify(&self, ip: &IpAddr) -> Result<ThreatVerdict, OracleError>;

    /// Oracle name for logging.
    fn name(&self) -> &str;
}
