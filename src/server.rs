//! HTTP listener routing every request through the gatekeeper.

use crate::gatekeeper::Gatekeeper;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

async fn gate(State(gatekeeper): State<Arc<Gatekeeper>>, request: Request) -> Response<Body> {
    gatekeeper.handle(request).await
}

/// Router sending any method and path through the gatekeeper.
pub fn router(gatekeeper: Arc<Gatekeeper>) -> Router {
    Router::new().fallback(gate).with_state(gatekeeper)
}

/// Serve the gatekeeper on `listener` until ctrl-c.
pub async fn serve(listener: TcpListener, gatekeeper: Arc<Gatekeeper>) -> std::io::Result<()> {
    info!(address = %listener.local_addr()?, "Edge gatekeeper listening");

    axum::serve(listener, router(gatekeeper))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
