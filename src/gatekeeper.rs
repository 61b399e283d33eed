//! Request gatekeeper: decides whether a request reaches the origin.

use crate::config::{IpExtractionConfig, Settings};
use crate::error::GatekeeperError;
use crate::oracle::ThreatOracle;
use crate::store::ApprovalStore;
use crate::upstream::Upstream;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Response, StatusCode};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const MISSING_CLIENT_IP_BODY: &str = "Unable to determine IP address or User Agent";
pub const ACCESS_DENIED_BODY: &str = "Access Denied";
pub const ERROR_BODY: &str = "An error occurred";

/// Where an approval or denial came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalSource {
    /// A live approval record.
    Cache,
    /// A fresh oracle lookup, now recorded.
    Oracle,
}

impl fmt::Display for ApprovalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalSource::Cache => write!(f, "cache"),
            ApprovalSource::Oracle => write!(f, "oracle"),
        }
    }
}

/// Outcome of vetting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// User-Agent on the bypass allowlist, or gatekeeper disabled.
    Bypass,
    Approved(ApprovalSource),
    Denied(ApprovalSource),
    /// No client IP header to vet.
    MissingClientIp,
}

impl Decision {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Decision::Bypass | Decision::Approved(_))
    }
}

/// Request gatekeeper.
pub struct Gatekeeper {
    enabled: bool,
    bypass_user_agents: HashSet<String>,
    ip_header: String,
    approval_ttl: Duration,
    store: Arc<dyn ApprovalStore>,
    oracle: Arc<dyn ThreatOracle>,
    upstream: Arc<dyn Upstream>,
}

impl Gatekeeper {
    /// Create a gatekeeper from its settings and injected collaborators.
    pub fn new(
        settings: &Settings,
        ip_extraction: &IpExtractionConfig,
        store: Arc<dyn ApprovalStore>,
        oracle: Arc<dyn ThreatOracle>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        info!(
            store = store.name(),
            oracle = oracle.name(),
            bypass_user_agents = settings.bypass_user_agents.len(),
            ip_header = %ip_extraction.header,
            "Gatekeeper initialized"
        );

        Self {
            enabled: settings.enabled,
            bypass_user_agents: settings.bypass_user_agents.iter().cloned().collect(),
            ip_header: ip_extraction.header.to_lowercase(),
            approval_ttl: settings.approval_ttl(),
            store,
            oracle,
            upstream,
        }
    }

    /// Check if a User-Agent skips IP vetting.
    fn is_bypassed(&self, user_agent: &str) -> bool {
        self.bypass_user_agents.contains(user_agent)
    }

    /// Decide what to do with a request from `client_ip` sent by `user_agent`.
    ///
    /// Records a verdict for the IP whenever the oracle is consulted
    /// successfully; oracle failures leave the IP unrecorded.
    pub async fn decide(
        &self,
        user_agent: Option<&str>,
        client_ip: Option<&str>,
    ) -> Result<Decision, GatekeeperError> {
        if !self.enabled {
            debug!("Gatekeeper disabled globally");
            return Ok(Decision::Bypass);
        }

        if let Some(user_agent) = user_agent {
            if self.is_bypassed(user_agent) {
                debug!(user_agent, "User agent is on the bypass allowlist");
                return Ok(Decision::Bypass);
            }
        }

        let Some(raw_ip) = client_ip else {
            debug!("No client IP found in request headers");
            return Ok(Decision::MissingClientIp);
        };
        let ip: IpAddr = raw_ip
            .parse()
            .map_err(|_| GatekeeperError::InvalidClientIp(raw_ip.to_string()))?;
        let key = ip.to_string();

        match self.store.lookup(&key).await? {
            Some(true) => {
                info!(ip = %ip, source = %ApprovalSource::Cache, "Client IP approved");
                return Ok(Decision::Approved(ApprovalSource::Cache));
            }
            Some(false) => {
                info!(ip = %ip, source = %ApprovalSource::Cache, "Client IP denied");
                return Ok(Decision::Denied(ApprovalSource::Cache));
            }
            None => {}
        }

        let verdict = self.oracle.classify(&ip).await?;

        if verdict.is_threat() {
            self.store.record(&key, false, self.approval_ttl).await?;
            info!(
                ip = %ip,
                source = %ApprovalSource::Oracle,
                signals = ?verdict.signals(),
                "Client IP denied"
            );
            Ok(Decision::Denied(ApprovalSource::Oracle))
        } else {
            self.store.record(&key, true, self.approval_ttl).await?;
            info!(ip = %ip, source = %ApprovalSource::Oracle, "Client IP approved");
            Ok(Decision::Approved(ApprovalSource::Oracle))
        }
    }

    /// Vet a request and either forward it or answer it directly.
    ///
    /// Never fails: every error becomes a 500 response.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Request processing failed");
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, ERROR_BODY)
            }
        }
    }

    async fn try_handle(&self, request: Request<Body>) -> Result<Response<Body>, GatekeeperError> {
        let headers = request.headers();
        let user_agent = user_agent(headers).map(str::to_owned);
        let client_ip = header_value(headers, &self.ip_header)?.map(str::to_owned);

        let decision = self
            .decide(user_agent.as_deref(), client_ip.as_deref())
            .await?;

        match decision {
            Decision::Bypass | Decision::Approved(_) => self
                .upstream
                .forward(request)
                .await
                .map_err(GatekeeperError::Upstream),
            Decision::Denied(_) => Ok(plain_response(StatusCode::FORBIDDEN, ACCESS_DENIED_BODY)),
            Decision::MissingClientIp => Ok(plain_response(
                StatusCode::BAD_REQUEST,
                MISSING_CLIENT_IP_BODY,
            )),
        }
    }
}

/// Read a header as text. Missing and blank headers are both `None`.
pub fn header_value<'a>(
    headers: &'a HeaderMap,
    name: &str,
) -> Result<Option<&'a str>, GatekeeperError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|e| GatekeeperError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    let value = value.trim();
    Ok((!value.is_empty()).then_some(value))
}

/// Read the User-Agent for allowlist matching.
///
/// Only compared for exact equality, so a value that is not UTF-8 simply
/// never matches instead of failing the request.
pub fn user_agent(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::USER_AGENT)?;
    let Ok(value) = std::str::from_utf8(value.as_bytes()) else {
        debug!("User agent is not UTF-8, skipping bypass check");
        return None;
    };

    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
