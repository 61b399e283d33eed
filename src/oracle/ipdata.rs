//! ipdata.co threat oracle.

use super::{ThreatOracle, ThreatVerdict};
use crate::config::OracleConfig;
use crate::error::OracleError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

/// Threat oracle backed by the ipdata.co `/threat` endpoint.
pub struct IpDataOracle {
    config: OracleConfig,
    client: Client,
}

impl IpDataOracle {
    /// Create a new ipdata oracle.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { config, client })
    }

    fn threat_url(&self, ip: &IpAddr) -> String {
        format!("{}/{}/threat", self.config.base_url.trim_end_matches('/'), ip)
    }
}

#[async_trait]
impl ThreatOracle for IpDataOracle {
    async fn classify(&self, ip: &IpAddr) -> Result<ThreatVerdict, OracleError> {
        debug!(ip = %ip, "Querying ipdata");

        let response = self
            .client
            .get(self.threat_url(ip))
            .query(&[("api-key", self.config.api_key.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("ipdata rate limit exceeded");
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            OracleError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;
        debug!(ip = %ip, response = %body, "ipdata response");

        ThreatVerdict::from_json(&body)
    }

    fn name(&self) -> &str {
        "ipdata"
    }
}
