use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors rendered to API callers. Messages are user-facing; the underlying
/// store or provider failure is logged where it happens and never included.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Please login or sign up first")]
    Unauthenticated,

    #[error("{0}")]
    Auth(String),

    #[error("An error occurred while toggling the like on the post")]
    ToggleFailed,

    #[error("Failed to create post. Please try again.")]
    UploadFailed,

    #[error("Failed to create post. Please try again.")]
    PersistFailed,

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ToggleFailed
            | ApiError::UploadFailed
            | ApiError::PersistFailed
            | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
