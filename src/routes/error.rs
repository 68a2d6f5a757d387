// API error -> status code + JSON body

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::query::{QueryError, ReadError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    BadRequest(#[from] QueryError),
    #[error("unauthorized")]
    Unauthorized,
    #[error("storage error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ReadError> for ApiError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Query(q) => ApiError::BadRequest(q),
            ReadError::Store(s) => ApiError::Internal(s),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Internal(e) => {
                tracing::warn!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
