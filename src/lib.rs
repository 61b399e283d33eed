//! Edge gatekeeper.
//!
//! Sits in front of an origin server and vets every request by client IP
//! before forwarding it.
//!
//! # Decision
//!
//! - **Bypass** - exact User-Agent matches skip all IP checks
//! - **Approval cache** - one verdict per IP, trusted until it expires (24h by default)
//! - **Threat oracle** - unknown IPs are looked up on ipdata.co; any raised
//!   threat signal (Tor, proxy, datacenter, known attacker, ...) denies the IP
//! - **Fail closed on errors** - oracle or store failures answer 500 and
//!   record nothing, so the next request retries the lookup
//!
//! # Example Configuration
//!
//! ```yaml
//! settings:
//!   approval_ttl_seconds: 86400
//!   bypass_user_agents:
//!     - "RevenueCat"
//!
//! oracle:
//!   api_key: "${IPDATA_API_KEY}"
//!
//! store:
//!   backend: redis
//!   redis_url: "redis://127.0.0.1:6379"
//!
//! upstream:
//!   origin: "http://127.0.0.1:8080"
//! ```

pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod oracle;
pub mod server;
pub mod store;
pub mod upstream;

pub use config::Config;
pub use gatekeeper::{ApprovalSource, Decision, Gatekeeper};
