//! Edge gatekeeper CLI.

use anyhow::{Context, Result};
use clap::Parser;
use edge_gatekeeper::config::StoreBackend;
use edge_gatekeeper::oracle::ipdata::IpDataOracle;
use edge_gatekeeper::server;
use edge_gatekeeper::store::memory::MemoryApprovalStore;
use edge_gatekeeper::store::redis_store::RedisApprovalStore;
use edge_gatekeeper::store::ApprovalStore;
use edge_gatekeeper::upstream::HttpUpstream;
use edge_gatekeeper::{Config, Gatekeeper};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "edge-gatekeeper")]
#[command(about = "Edge gatekeeper - vet client IPs against a threat oracle before forwarding to the origin")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gatekeeper.yaml")]
    config: PathBuf,

    /// Listen address, overrides server.listen
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

/// How often expired records are swept from the in-memory store.
const MEMORY_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

fn build_store(config: &Config) -> Result<Arc<dyn ApprovalStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemoryApprovalStore::new(config.store.max_entries));

            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(MEMORY_CLEANUP_INTERVAL);
                loop {
                    interval.tick().await;
                    sweeper.cleanup();
                }
            });

            Ok(store)
        }
        StoreBackend::Redis => Ok(Arc::new(RedisApprovalStore::new(&config.store)?)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let store = build_store(&config)?;
    let oracle = Arc::new(IpDataOracle::new(config.oracle.clone())?);
    let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);

    let gatekeeper = Arc::new(Gatekeeper::new(
        &config.settings,
        &config.ip_extraction,
        store,
        oracle,
        upstream,
    ));

    let listen = args.listen.unwrap_or(config.server.listen);
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;

    info!(origin = %config.upstream.origin, "Starting edge gatekeeper");
    server::serve(listener, gatekeeper).await?;

    Ok(())
}
