use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
};
use serde::Serialize;

use crate::routes::ApiError;
use crate::state::SharedState;

/// Simple health-check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /api/health`
///
/// Returns a basic JSON document indicating liveness.
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "Server running",
        }),
    )
}

/// `GET /metrics`
///
/// Prometheus text exposition of the ledger registry.
pub async fn metrics(
    State(state): State<SharedState>,
) -> Result<([(header::HeaderName, &'static str); 1], String), ApiError> {
    if !state.metrics_enabled {
        return Err((StatusCode::NOT_FOUND, "metrics disabled".to_string()));
    }
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.ledger.metrics().gather_text(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use bams_chain::{EntityKind, Transaction};

    #[tokio::test]
    async fn health_reports_running() {
        let (status, Json(body)) = health().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "Server running");
    }

    #[tokio::test]
    async fn metrics_expose_ledger_counters() {
        let state = AppState::for_tests();
        state
            .ledger
            .get_or_create(EntityKind::Department, "d1", Transaction::new("department_creation"))
            .await
            .unwrap();

        let (_, text) = metrics(State(state)).await.unwrap();
        assert!(text.contains("bams_ledger_chains_created_total 1"));
    }
}
