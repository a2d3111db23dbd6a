//! Error types and handling for the traffic logger.
//!
//! [`AppError`] covers every failure the proxy can surface. Its
//! `IntoResponse` impl produces the minimal `{"error": "<message>"}` body that
//! callers see when the proxy, rather than the upstream, answers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// The task running an exchange panicked or was aborted
    #[error("Internal error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Upstream could not be reached or read (connect, timeout, reset)
    #[error("{0}")]
    Upstream(#[from] reqwest::Error),

    /// The inbound request could not be read
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Filesystem errors from the log writer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// HTTP status the proxy answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Task(_) | AppError::Io(_) | AppError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = AppError::BadRequest("body too large".to_string());
        assert_eq!(err.to_string(), "Bad request: body too large");
    }

    #[tokio::test]
    async fn test_panicked_task_is_internal_error() {
        let join_err = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let err = AppError::from(join_err);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Internal error:"));

        let body = body_json(err.into_response()).await;
        assert!(body["error"].as_str().unwrap().starts_with("Internal error:"));
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response = AppError::BadRequest("oops".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "Bad request: oops"}));
    }

    #[tokio::test]
    async fn test_upstream_error_is_bad_gateway() {
        // Nothing listens on port 1; the connection is refused immediately.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();
        let app_err = AppError::from(err);
        assert_eq!(app_err.status_code(), StatusCode::BAD_GATEWAY);

        let message = app_err.to_string();
        let body = body_json(app_err.into_response()).await;
        assert_eq!(body["error"], message);
    }

    #[test]
    fn test_io_error_is_internal() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
