use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Lifecycle misuse: an operation requested in a state that cannot
    /// service it (e.g. playback with no session attached).
    #[error("Precondition violated: {0}")]
    Lifecycle(String),

    #[error("Browser automation error: {0}")]
    Browser(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Replay error: {0}")]
    Replay(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            AppError::Lifecycle(_) => (StatusCode::PRECONDITION_FAILED, "Precondition Failed"),
            AppError::Browser(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Browser Error"),
            AppError::Recording(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Recording Error"),
            AppError::Replay(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Replay Error"),
            AppError::Script(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Script Error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
