//! Extractors that turn axum rejections into structured `AppError` responses.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Request,
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection},
    },
    http::request::Parts,
};
use serde_json::json;

use crate::error::AppError;

/// Drop-in replacement for `axum::Json<T>` whose deserialization failures
/// come back as `AppError::Validation` instead of axum's plain-text 422.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    let field = field_from_serde_message(&body_text).unwrap_or_else(|| "body".to_string());

    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field),
        received: None,
        docs_hint: Some("Check the request body against the schema at /swagger-ui.".to_string()),
    }
}

/// Drop-in replacement for `axum::extract::Path<T>`: an id that does not
/// parse comes back as `AppError::Validation` with the offending segment.
pub struct AppPath<T>(pub T);

impl<S, T> FromRequestParts<S> for AppPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(AppPath(value)),
            Err(rejection) => Err(map_path_rejection(rejection)),
        }
    }
}

fn map_path_rejection(rejection: PathRejection) -> AppError {
    let (field, received) = match &rejection {
        PathRejection::FailedToDeserializePathParams(inner) => match inner.kind() {
            ErrorKind::ParseErrorAtKey { key, value, .. } => {
                (Some(key.clone()), Some(json!(value)))
            }
            ErrorKind::ParseErrorAtIndex { value, .. } | ErrorKind::ParseError { value, .. } => {
                (None, Some(json!(value)))
            }
            _ => (None, None),
        },
        _ => (None, None),
    };

    AppError::Validation {
        message: format!("Invalid path parameter: {}", rejection.body_text()),
        field,
        received,
        docs_hint: Some("Path ids are integers, e.g. /api/v1/missions/1.".to_string()),
    }
}

/// Pull the field name out of serde's "missing field `x`" / "unknown field `x`"
/// messages.
fn field_from_serde_message(msg: &str) -> Option<String> {
    ["missing field `", "unknown field `"]
        .iter()
        .find_map(|pattern| {
            let start = msg.find(pattern)? + pattern.len();
            let rest = &msg[start..];
            rest.find('`').map(|end| rest[..end].to_string())
        })
}
