//! Pass-through forwarding of approved requests to the origin.

use crate::config::UpstreamConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Response, Uri};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Destination for requests the gatekeeper lets through.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>>;
}

/// Headers scoped to a single connection, never forwarded in either direction.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Forwards requests unchanged to a fixed origin over HTTP.
///
/// Bodies are buffered in full in both directions. A request body over
/// `max_body_bytes` fails the forward before the origin is contacted.
pub struct HttpUpstream {
    origin: String,
    max_body_bytes: usize,
    client: Client,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create upstream HTTP client")?;

        Ok(Self {
            origin: config.origin.trim_end_matches('/').to_string(),
            max_body_bytes: config.max_body_bytes,
            client,
        })
    }

    /// Origin URL for the path and query of an inbound request.
    fn upstream_url(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("{}{}", self.origin, path_and_query)
    }
}

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        // reqwest derives host from the origin URL
        if name == header::HOST || is_hop_by_hop(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>> {
        let (parts, body) = request.into_parts();
        let url = self.upstream_url(&parts.uri);
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .context("Failed to read request body")?;

        debug!(method = %parts.method, url = %url, "Forwarding request to origin");

        let upstream_response = self
            .client
            .request(parts.method, &url)
            .headers(forwardable_headers(&parts.headers))
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach origin {}", url))?;

        let status = upstream_response.status();
        let headers = forwardable_headers(upstream_response.headers());
        let bytes = upstream_response
            .bytes()
            .await
            .context("Failed to read response body from origin")?;

        debug!(status = %status, url = %url, "Origin responded");

        let mut response = Response::builder()
            .status(status)
            .body(Body::from(bytes))
            .context("Failed to build response")?;
        *response.headers_mut() = headers;

        Ok(response)
    }
}
