use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loom_core::CoreError;

/// Wraps `loom_core::CoreError` with an HTTP status mapping. Every handler
/// in the pipeline returns `Result<_, AppError>` with `?` so the pipeline
/// itself never pattern-matches errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Core(CoreError::NotFound(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Core(CoreError::ResolveError { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Core(CoreError::ParseError { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Core(CoreError::Config(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Core(CoreError::Io { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        tracing::warn!(%status, %message, "request failed");

        (status, message).into_response()
    }
}
