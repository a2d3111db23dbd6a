//! Core functionality for the traffic logger.
//!
//! This module contains the pieces the HTTP layer is built on:
//! - Configuration management
//! - Error handling
//! - Header filtering between caller and upstream
//! - Tolerant extraction of logging fields from request/response bodies
//! - The per-day JSONL traffic log
//! - Operational (tracing) logging setup

pub mod config;
pub mod error;
pub mod header_policy;
pub mod jsonl_logger;
pub mod logging;
pub mod summary;

// Re-export commonly used types
pub use config::{AppConfig, ServerConfig};
pub use error::{AppError, Result};
pub use jsonl_logger::{JsonlLogger, LogEntry};
pub use logging::{generate_request_id, init_tracing};
pub use summary::{RequestSummary, ResponseSummary, PREVIEW_MAX_CHARS};
