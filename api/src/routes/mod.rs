pub mod health;
pub mod missions;
pub mod targets;

use serde::Serialize;

/// Plain acknowledgement for state-changing endpoints
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
