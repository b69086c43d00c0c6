use axum::{extract::State, http::StatusCode, Json};

use crate::config::{AppState, HealthStatus};

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Refund Service",
    summary = "Health check",
    description = "Report database reachability and the gateway key mode",
    responses(
        (status = 200, description = "Service is healthy", body = HealthStatus),
        (status = 503, description = "Database unreachable", body = HealthStatus)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let health = state.health_check().await;

    let status = if health.overall == "healthy" {
        StatusCode::OK
    } else {
        tracing::warn!(database = %health.database, "⚠️ Health check degraded");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(health))
}
