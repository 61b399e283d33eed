//! Configuration types for the edge gatekeeper.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Root configuration for the edge gatekeeper.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// Client IP extraction.
    #[serde(default)]
    pub ip_extraction: IpExtractionConfig,

    /// Threat oracle.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Approval store.
    #[serde(default)]
    pub store: StoreConfig,

    /// Origin the approved requests are forwarded to.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Listener.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Master enable/disable switch. When disabled every request is forwarded.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long an approval or denial stays authoritative for an IP.
    #[serde(default = "default_approval_ttl")]
    pub approval_ttl_seconds: u64,

    /// Exact User-Agent strings that skip every IP check.
    #[serde(default = "default_bypass_user_agents")]
    pub bypass_user_agents: Vec<String>,
}

impl Settings {
    pub fn approval_ttl(&self) -> Duration {
        Duration::from_secs(self.approval_ttl_seconds)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            approval_ttl_seconds: default_approval_ttl(),
            bypass_user_agents: default_bypass_user_agents(),
        }
    }
}

fn default_approval_ttl() -> u64 {
    86_400
}

fn default_bypass_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0+(compatible; UptimeRobot/2.0; http://www.uptimerobot.com/)".to_string(),
        "RevenueCat".to_string(),
        "pusher-webhooks".to_string(),
    ]
}

/// Client IP extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpExtractionConfig {
    /// Header populated by the edge with the connecting client's address.
    /// Only a header the edge overwrites on every request can be trusted here.
    #[serde(default = "default_ip_header")]
    pub header: String,
}

impl Default for IpExtractionConfig {
    fn default() -> Self {
        Self {
            header: default_ip_header(),
        }
    }
}

fn default_ip_header() -> String {
    "cf-connecting-ip".to_string()
}

/// Threat oracle (ipdata.co compatible) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    /// Base URL of the oracle API.
    #[serde(default = "default_oracle_url")]
    pub base_url: String,

    /// API key (supports ${ENV_VAR} syntax).
    #[serde(default)]
    pub api_key: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_oracle_timeout")]
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            api_key: String::new(),
            timeout_ms: default_oracle_timeout(),
        }
    }
}

fn default_oracle_url() -> String {
    "https://api.ipdata.co".to_string()
}

fn default_oracle_timeout() -> u64 {
    5000
}

/// Approval store backend.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process TTL map. Approvals are lost on restart.
    #[default]
    Memory,
    /// Shared Redis instance.
    Redis,
}

/// Approval store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Capacity of the in-memory store.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Redis connection URL (required for the redis backend).
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Redis connection pool size.
    #[serde(default = "default_redis_pool_size")]
    pub redis_pool_size: usize,

    /// Prefix for approval keys in Redis.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            max_entries: default_max_entries(),
            redis_url: None,
            redis_pool_size: default_redis_pool_size(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_max_entries() -> usize {
    100_000
}

fn default_redis_pool_size() -> usize {
    16
}

fn default_key_prefix() -> String {
    "gatekeeper:ip:".to_string()
}

/// Origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Origin base URL, e.g. "http://127.0.0.1:8080".
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Total request timeout in milliseconds.
    #[serde(default = "default_upstream_timeout")]
    pub timeout_ms: u64,

    /// Largest request body that will be buffered and forwarded.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            timeout_ms: default_upstream_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_origin() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_upstream_timeout() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8787))
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding ${VAR} references first.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.settings.approval_ttl_seconds == 0 {
            anyhow::bail!("approval_ttl_seconds must be greater than zero");
        }

        if self.ip_extraction.header.trim().is_empty() {
            anyhow::bail!("ip_extraction.header must not be empty");
        }

        if self.oracle.api_key.is_empty() {
            anyhow::bail!("oracle.api_key is empty");
        }

        if !is_http_url(&self.oracle.base_url) {
            anyhow::bail!("oracle.base_url is not an http(s) URL: {}", self.oracle.base_url);
        }

        if !is_http_url(&self.upstream.origin) {
            anyhow::bail!("upstream.origin is not an http(s) URL: {}", self.upstream.origin);
        }

        match self.store.backend {
            StoreBackend::Memory => {
                if self.store.max_entries == 0 {
                    anyhow::bail!("store.max_entries must be greater than zero");
                }
            }
            StoreBackend::Redis => {
                if self.store.redis_url.as_deref().map_or(true, str::is_empty) {
                    anyhow::bail!("store.backend is redis but redis_url is not set");
                }
                if self.store.redis_pool_size == 0 {
                    anyhow::bail!("store.redis_pool_size must be greater than zero");
                }
            }
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Edge Gatekeeper Configuration

settings:
  enabled: true
  approval_ttl_seconds: 86400  # How long a verdict is trusted for an IP
  bypass_user_agents:          # Exact matches skip all IP checks
    - "Mozilla/5.0+(compatible; UptimeRobot/2.0; http://www.uptimerobot.com/)"
    - "RevenueCat"
    - "pusher-webhooks"

# Header set by the edge with the connecting client's address
ip_extraction:
  header: "cf-connecting-ip"

# Threat oracle (ipdata.co)
oracle:
  base_url: "https://api.ipdata.co"
  api_key: "${IPDATA_API_KEY}" # Use environment variable
  timeout_ms: 5000

# Approval store
store:
  backend: memory              # memory or redis
  max_entries: 100000          # memory backend only
  redis_url: "redis://127.0.0.1:6379"
  redis_pool_size: 16
  key_prefix: "gatekeeper:ip:"

# Origin for approved requests
upstream:
  origin: "http://127.0.0.1:8080"
  timeout_ms: 30000
  max_body_bytes: 10485760

server:
  listen: "0.0.0.0:8787"
"#
        .to_string()
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> anyhow::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;
    let expanded = re.replace_all(content, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_default()
    });
    Ok(expanded.into_owned())
}
