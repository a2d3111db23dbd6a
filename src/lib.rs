//! API Traffic Logger - a transparent forwarding proxy for the Anthropic API
//!
//! Clients point their base URL at this proxy instead of the upstream. Every
//! request is forwarded unchanged (minus `Host`/`Content-Length`), the upstream
//! response is relayed back byte-for-byte, and one JSON line describing the
//! exchange is appended to `<LOG_DIR>/<PROJECT_NAME>/api-log-<YYYY-MM-DD>.jsonl`.
//!
//! # Architecture
//!
//! - [`core`]: configuration, errors, header policy, body summaries and the
//!   JSONL log writer
//! - [`api`]: the router, the forwarding handler and the local endpoints
//!   (`GET /health`, CORS preflight)
//!
//! # Configuration
//!
//! Optional environment variables:
//! - `LOG_DIR`: Root directory for traffic logs (default: /data/api-logs)
//! - `PROJECT_NAME`: Project identifier (default: default)
//! - `HOST`: Server bind address (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8000)
//! - `UPSTREAM_URL`: Upstream base URL (default: https://api.anthropic.com)
//! - `REQUEST_TIMEOUT_SECS`: Upstream timeout in seconds (default: 300)
//! - `MAX_BODY_BYTES`: Largest accepted request body (default: 32 MiB)

pub mod api;
pub mod core;

// Re-export commonly used types for convenience
pub use api::{router, AppState};
pub use crate::core::{AppConfig, AppError, JsonlLogger, LogEntry, Result};
