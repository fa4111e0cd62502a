use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::{RecommendationReply, ResponseStatus};

/// Application-level errors surfaced to HTTP callers
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> ResponseStatus {
        match self {
            AppError::BadRequest(_) => ResponseStatus::BadRequest,
            AppError::DeadlineExceeded => ResponseStatus::DeadlineExceeded,
            AppError::Internal(_) => ResponseStatus::Internal,
        }
    }

    /// Converts a non-success reply into the matching error
    pub fn from_reply(reply: RecommendationReply) -> Option<Self> {
        let message = reply.message.unwrap_or_default();
        match reply.status {
            ResponseStatus::Ok | ResponseStatus::OkDegraded => None,
            ResponseStatus::BadRequest => Some(AppError::BadRequest(message)),
            ResponseStatus::DeadlineExceeded => Some(AppError::DeadlineExceeded),
            ResponseStatus::Internal => Some(AppError::Internal(message)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let wire_status = self.status();
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::DeadlineExceeded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Request deadline exceeded".to_string(),
            ),
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": wire_status,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
