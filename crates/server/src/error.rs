// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ingest_monitor_core::HistoryError;
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::History(history_err) => {
                let error_msg = match history_err {
                    HistoryError::PermissionDenied { path } => {
                        tracing::error!(path = %path.display(), "Permission denied on history");
                        "Cannot access transfer history"
                    }
                    HistoryError::Io { path, source } => {
                        tracing::error!(path = %path.display(), error = %source, "History IO error");
                        "IO error accessing transfer history"
                    }
                    HistoryError::Serialize(e) => {
                        tracing::error!(error = %e, "History serialization failed");
                        "Transfer history could not be encoded"
                    }
                    HistoryError::Persist { path, source } => {
                        tracing::error!(path = %path.display(), error = %source, "History rewrite failed");
                        "Transfer history could not be saved"
                    }
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details(error_msg, history_err.to_string()),
                )
            }
            ApiError::Task(join_err) => {
                tracing::error!(error = %join_err, "Blocking task failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
        };
        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::path::PathBuf;

    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_history_permission_denied_returns_500() {
        let error = ApiError::History(HistoryError::PermissionDenied {
            path: PathBuf::from("/data/history.json"),
        });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.ok);
        assert_eq!(body.error, "Cannot access transfer history");
        assert!(body.details.unwrap().contains("/data/history.json"));
    }

    #[tokio::test]
    async fn test_history_persist_error() {
        let error = ApiError::History(HistoryError::Persist {
            path: PathBuf::from("/data/history.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "cross-device link"),
        });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Transfer history could not be saved");
        assert!(body.details.unwrap().contains("cross-device link"));
    }

    #[tokio::test]
    async fn test_bad_request_returns_400() {
        let error = ApiError::BadRequest("limit must be a number".to_string());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Bad request");
        assert_eq!(body.details.as_deref(), Some("limit must be a number"));
    }

    #[tokio::test]
    async fn test_task_failure_hides_details() {
        let join_err = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let (status, body) = extract_response(ApiError::Task(join_err).into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(body.details.is_none());
    }
}
