//! HTTP surface: `GET /` answers with the aggregated report.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{Json, Router, extract::State, routing::get};
use regionfeed_core::{AggregateReport, RegionOrchestrator};
use tracing::{info, warn};

/// `GET /` backed by `orchestrator`.
pub fn router(orchestrator: RegionOrchestrator) -> Router {
    Router::new()
        .route("/", get(regions))
        .with_state(orchestrator)
}

/// Runs the orchestrator once per request. Valid cache rows make repeat
/// requests cheap.
async fn regions(
    State(orchestrator): State<RegionOrchestrator>,
) -> Json<AggregateReport> {
    Json(orchestrator.run().await)
}

/// Serve until Ctrl-C.
pub async fn serve(
    orchestrator: RegionOrchestrator,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Serving regions on http://{}", listener.local_addr()?);

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            warn!(
                "Failed to listen for Ctrl-C, serving until killed: {}",
                err
            );
            std::future::pending::<()>().await;
        }
    }
}
