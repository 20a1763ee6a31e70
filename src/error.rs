use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    // === CONVERSION ERRORS ===
    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    // === APPLICATION ERRORS ===
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("email delivery failed: {0}")]
    Delivery(String),

    #[error("oauth error: {0}")]
    OAuth(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(m) | ApiError::BadRequest(m) => {
                (StatusCode::BAD_REQUEST, m.clone())
            }
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::Delivery(m) => {
                error!(error = %m, "mail delivery failed");
                (StatusCode::BAD_GATEWAY, "Failed to send email".to_string())
            }
            ApiError::OAuth(m) => {
                error!(error = %m, "oauth flow failed");
                (StatusCode::BAD_GATEWAY, "OAuth login failed".to_string())
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
