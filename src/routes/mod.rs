use axum::Json;

use crate::utils::{ApiResponse, message_to_api_response};

pub mod student;
pub mod user;

pub async fn health() -> Json<ApiResponse<()>> {
    message_to_api_response("ok")
}
