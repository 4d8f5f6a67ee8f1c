use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{ApiResponse, error_codes, error_to_api_response, validation::FieldError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    Conflict(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("too many requests")]
    RateLimited { retry_after_secs: u64 },
    #[error("store i/o failure: {0}")]
    StoreIo(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreIo(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> i32 {
        match self {
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::Conflict(_) => error_codes::USER_EXISTS,
            AppError::Unauthenticated | AppError::InvalidCredentials => error_codes::AUTH_FAILED,
            AppError::Forbidden => error_codes::PERMISSION_DENIED,
            AppError::NotFound => error_codes::NOT_FOUND,
            AppError::RateLimited { .. } => error_codes::RATE_LIMIT,
            AppError::StoreIo(_) | AppError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    fn field(field: &str, message: &str) -> Self {
        AppError::Validation(vec![FieldError {
            field: field.to_string(),
            message: message.to_string(),
        }])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (msg, resp_data) = match self {
            AppError::Validation(errors) => ("validation failed".to_string(), Some(errors)),
            AppError::Conflict(msg) => (msg, None),
            AppError::RateLimited { retry_after_secs } => {
                let body = error_to_api_response::<()>(
                    code,
                    format!("too many requests, retry in {} seconds", retry_after_secs),
                );
                let mut resp = (status, body).into_response();
                if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    resp.headers_mut().insert(header::RETRY_AFTER, v);
                }
                return resp;
            }
            // 内部细节只写日志，不返回给客户端
            AppError::StoreIo(detail) => {
                tracing::error!(error = %detail, "store i/o failure");
                ("internal server error".to_string(), None)
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                ("internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = Json(ApiResponse {
            code,
            msg,
            resp_data,
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::field("body", &rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::field("id", "must be a positive integer")
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::field("query", &rejection.body_text())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::StoreIo(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn store_failure_hides_details() {
        let resp = AppError::StoreIo("/secret/path/db.json: permission denied".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["code"], 5000);
        assert!(!json.to_string().contains("/secret/path"));
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let resp = AppError::field("email", "is required").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["resp_data"][0]["field"], "email");
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let resp = AppError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn credential_errors_share_one_message() {
        assert_eq!(AppError::InvalidCredentials.to_string(), "invalid credentials");
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
    }
}
