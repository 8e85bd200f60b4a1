use axum::extract::State;
use axum::routing::patch;
use axum::{Json, Router};

use spycat_core::error::ApiError;
use spycat_core::mission::TargetId;

use crate::error::AppError;
use crate::extract::AppPath;
use crate::routes::MessageResponse;
use crate::state::AppState;
use crate::store::MissionStore;

pub fn router<S: MissionStore>() -> Router<AppState<S>> {
    Router::new().route("/api/v1/targets/{id}", patch(complete_target::<S>))
}

/// Mark a target completed
///
/// Independent of the mission's own completion.
#[utoipa::path(
    patch,
    path = "/api/v1/targets/{id}",
    params(("id" = i64, Path, description = "Target ID")),
    responses(
        (status = 200, description = "Target completed", body = MessageResponse),
        (status = 404, description = "Target not found", body = ApiError)
    ),
    tag = "targets"
)]
pub async fn complete_target<S: MissionStore>(
    State(state): State<AppState<S>>,
    AppPath(id): AppPath<TargetId>,
) -> Result<Json<MessageResponse>, AppError> {
    state.missions.complete_target(id).await?;
    Ok(Json(MessageResponse {
        message: format!("target {id} completed"),
    }))
}
