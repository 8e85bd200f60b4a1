use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use spycat_core::error::{self, ApiError};
use spycat_core::mission::MAX_TARGETS_PER_MISSION;

use crate::engine::MissionError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Mission payload carries more targets than allowed (400)
    TooManyTargets { count: usize, max: usize },
    /// Mission, target or cat does not exist (404)
    NotFound { resource: String },
    /// Target cannot be attached to a completed mission (409)
    MissionCompleted { mission_id: i64 },
    /// Unique constraint violated (409)
    Conflict { constraint: String },
    /// Internal error (500)
    Internal(String),
}

impl From<MissionError> for AppError {
    fn from(err: MissionError) -> Self {
        match err {
            MissionError::NotFound { resource } => AppError::NotFound { resource },
            MissionError::TooManyTargets { count, max } => AppError::TooManyTargets { count, max },
            MissionError::MissionCompleted { mission_id } => AppError::MissionCompleted {
                mission_id: mission_id.0,
            },
            MissionError::AlreadyExists { constraint } => AppError::Conflict { constraint },
            MissionError::Internal(message) => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::TooManyTargets { count, max } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::TOO_MANY_TARGETS.to_string(),
                    message: format!("A mission accepts at most {max} targets, got {count}"),
                    field: Some("targets".to_string()),
                    received: Some(serde_json::json!(count)),
                    request_id,
                    docs_hint: Some(format!(
                        "Create the mission with up to {MAX_TARGETS_PER_MISSION} targets and move \
                         further targets in with PATCH /api/v1/missions/{{mission_id}}/targets/{{target_id}}."
                    )),
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::MissionCompleted { mission_id } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::MISSION_COMPLETED.to_string(),
                    message: format!("Mission {mission_id} is completed"),
                    field: Some("mission_id".to_string()),
                    received: Some(serde_json::json!(mission_id)),
                    request_id,
                    docs_hint: Some(
                        "Completed missions are closed for new targets. Pick an open mission."
                            .to_string(),
                    ),
                },
            ),
            AppError::Conflict { constraint } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::CONFLICT.to_string(),
                    message: format!("Already exists ({constraint})"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "The row already exists; read it back instead of creating it again."
                            .to_string(),
                    ),
                },
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}
