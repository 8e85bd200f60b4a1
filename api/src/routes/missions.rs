use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Serialize;

use spycat_core::error::ApiError;
use spycat_core::mission::{AgentId, CreateMissionRequest, Mission, MissionId, TargetId};

use crate::error::AppError;
use crate::extract::{AppJson, AppPath};
use crate::routes::MessageResponse;
use crate::state::AppState;
use crate::store::MissionStore;

pub fn router<S: MissionStore>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/api/v1/missions",
            get(list_missions::<S>).post(create_mission::<S>),
        )
        .route(
            "/api/v1/missions/{id}",
            get(get_mission::<S>).patch(complete_mission::<S>),
        )
        .route(
            "/api/v1/missions/{mission_id}/cats/{cat_id}",
            patch(assign_mission_to_cat::<S>),
        )
        .route(
            "/api/v1/missions/{mission_id}/targets/{target_id}",
            patch(add_target_to_mission::<S>),
        )
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateMissionResponse {
    #[schema(value_type = i64)]
    pub id: MissionId,
}

/// Create a mission with up to three targets
///
/// The mission and all of its targets are written in one transaction.
/// If any target fails, nothing is stored.
#[utoipa::path(
    post,
    path = "/api/v1/missions",
    request_body = CreateMissionRequest,
    responses(
        (status = 201, description = "Mission created", body = CreateMissionResponse),
        (status = 400, description = "Invalid body or more than three targets", body = ApiError),
        (status = 404, description = "Referenced cat does not exist", body = ApiError),
        (status = 409, description = "Duplicate target name", body = ApiError)
    ),
    tag = "missions"
)]
pub async fn create_mission<S: MissionStore>(
    State(state): State<AppState<S>>,
    AppJson(req): AppJson<CreateMissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = state.missions.create_mission(req).await?;
    Ok((StatusCode::CREATED, Json(CreateMissionResponse { id })))
}

/// List all missions with their targets
#[utoipa::path(
    get,
    path = "/api/v1/missions",
    responses(
        (status = 200, description = "All missions", body = Vec<Mission>)
    ),
    tag = "missions"
)]
pub async fn list_missions<S: MissionStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Mission>>, AppError> {
    let missions = state.missions.list_missions().await?;
    Ok(Json(missions))
}

/// Get one mission with its targets
#[utoipa::path(
    get,
    path = "/api/v1/missions/{id}",
    params(("id" = i64, Path, description = "Mission ID")),
    responses(
        (status = 200, description = "Mission", body = Mission),
        (status = 404, description = "Mission not found", body = ApiError)
    ),
    tag = "missions"
)]
pub async fn get_mission<S: MissionStore>(
    State(state): State<AppState<S>>,
    AppPath(id): AppPath<MissionId>,
) -> Result<Json<Mission>, AppError> {
    let mission = state.missions.get_mission(id).await?;
    Ok(Json(mission))
}

/// Mark a mission completed (idempotent, irreversible)
#[utoipa::path(
    patch,
    path = "/api/v1/missions/{id}",
    params(("id" = i64, Path, description = "Mission ID")),
    responses(
        (status = 200, description = "Mission completed", body = MessageResponse),
        (status = 404, description = "Mission not found", body = ApiError)
    ),
    tag = "missions"
)]
pub async fn complete_mission<S: MissionStore>(
    State(state): State<AppState<S>>,
    AppPath(id): AppPath<MissionId>,
) -> Result<Json<MessageResponse>, AppError> {
    state.missions.complete_mission(id).await?;
    Ok(Json(MessageResponse {
        message: format!("mission completed: {id}"),
    }))
}

/// Assign a mission to a cat
#[utoipa::path(
    patch,
    path = "/api/v1/missions/{mission_id}/cats/{cat_id}",
    params(
        ("mission_id" = i64, Path, description = "Mission ID"),
        ("cat_id" = i64, Path, description = "Cat ID")
    ),
    responses(
        (status = 200, description = "Mission assigned", body = MessageResponse),
        (status = 404, description = "Mission or cat not found", body = ApiError)
    ),
    tag = "missions"
)]
pub async fn assign_mission_to_cat<S: MissionStore>(
    State(state): State<AppState<S>>,
    AppPath((mission_id, cat_id)): AppPath<(MissionId, AgentId)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .missions
        .assign_mission_to_cat(cat_id, mission_id)
        .await?;
    Ok(Json(MessageResponse {
        message: format!("mission {mission_id} assigned to cat {cat_id}"),
    }))
}

/// Move a target onto a mission
///
/// The target leaves whatever mission it belonged to. Completed missions
/// accept no targets.
#[utoipa::path(
    patch,
    path = "/api/v1/missions/{mission_id}/targets/{target_id}",
    params(
        ("mission_id" = i64, Path, description = "Destination mission ID"),
        ("target_id" = i64, Path, description = "Target ID")
    ),
    responses(
        (status = 200, description = "Target moved", body = MessageResponse),
        (status = 404, description = "Mission or target not found", body = ApiError),
        (status = 409, description = "Mission completed, or duplicate target name", body = ApiError)
    ),
    tag = "targets"
)]
pub async fn add_target_to_mission<S: MissionStore>(
    State(state): State<AppState<S>>,
    AppPath((mission_id, target_id)): AppPath<(MissionId, TargetId)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .missions
        .add_target_to_mission(mission_id, target_id)
        .await?;
    Ok(Json(MessageResponse {
        message: format!("target {target_id} added to mission {mission_id}"),
    }))
}
