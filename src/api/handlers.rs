//! Shared state and the endpoints that never touch the upstream.

use crate::api::upstream::create_http_client;
use crate::core::config::AppConfig;
use crate::core::jsonl_logger::{JsonlLogger, LogEntry};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: AppConfig,
    pub http_client: reqwest::Client,
    pub logger: JsonlLogger,
}

impl AppState {
    pub fn new(config: AppConfig, http_client: reqwest::Client) -> Self {
        let logger = JsonlLogger::from_config(&config);
        Self {
            config,
            http_client,
            logger,
        }
    }

    /// Build the state together with its HTTP client.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let http_client = create_http_client(&config)?;
        Ok(Self::new(config, http_client))
    }

    /// Append an entry to the traffic log.
    ///
    /// A failed write is reported and otherwise ignored: the caller's response
    /// does not depend on the health of the log directory.
    pub async fn record(&self, entry: &LogEntry) {
        if let Err(e) = self.logger.append(entry).await {
            tracing::error!(
                error = %e,
                path = %entry.path,
                status_code = entry.status_code,
                "Failed to write traffic log entry"
            );
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub project: String,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        project: state.config.project.clone(),
    })
}

/// CORS preflight for any path.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
}
