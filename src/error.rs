use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// An upstream store failed while building recommendations or similar tracks.
    /// The engine never retries; the cause is kept as the error source.
    #[error("Recommendation generation failed: {0}")]
    RecommendationGenerationFailed(#[source] Box<AppError>),

    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps an upstream store error for the caller.
    ///
    /// Expected conditions (unknown seed, cancellation, bad input) pass through unchanged,
    /// as does an error that is already wrapped.
    pub fn generation_failed(cause: AppError) -> Self {
        match cause {
            AppError::TrackNotFound(_)
            | AppError::InvalidInput(_)
            | AppError::Cancelled
            | AppError::DeadlineExceeded
            | AppError::RecommendationGenerationFailed(_) => cause,
            other => AppError::RecommendationGenerationFailed(Box::new(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::TrackNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RecommendationGenerationFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
