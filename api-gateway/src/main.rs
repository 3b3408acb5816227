// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes the attendance-management HTTP API on top of the
//! `bams-chain` ledger:
//!
//! - `GET /api/health`, `GET /metrics`
//! - CRUD for departments, classes and students under `/api/...`
//! - attendance marking and history under `/api/attendance`
//! - chain validation under `/api/validate/{department_id}`
//!
//! Every mutation is recorded as a mined block on the affected entity's
//! chain. Records and chains live in memory only.

mod config;
mod directory;
mod routes;
mod state;

use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use bams_chain::{LedgerConfig, MetricsRegistry};
use config::ApiConfig;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bams_api=info,bams_chain=info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env();
    let ledger_cfg = LedgerConfig::from_env();

    // ---------------------------
    // Metrics + ledger
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    let app_state: SharedState = Arc::new(AppState::new(&ledger_cfg, metrics));

    tracing::info!(
        difficulty = ledger_cfg.policy.difficulty,
        mining_workers = ledger_cfg.mining.workers,
        metrics = ledger_cfg.metrics.enabled,
        "ledger ready"
    );

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = routes::router(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
