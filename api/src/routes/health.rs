use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};

use crate::HealthResponse;
use crate::state::AppState;
use crate::store::{StoreHealth, MissionStore};

pub fn router<S: MissionStore>() -> Router<AppState<S>> {
    Router::new().route("/health", get(health_check::<S>))
}

/// Health check endpoint: verifies both API and database are reachable
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check<S: MissionStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let (status, http_status) = match state.store.ping().await {
        Ok(()) => ("ok", StatusCode::OK),
        Err(err) => {
            tracing::warn!(error = %err, "health check: database unreachable");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
