//! Configuration management for the traffic logger.
//!
//! All settings are read once from environment variables at startup and then
//! passed around as an immutable [`AppConfig`] value.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Project identifier; selects the log subdirectory and is echoed in every entry
    #[serde(default = "default_project")]
    pub project: String,

    /// Root directory for JSONL logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Base URL of the single upstream API, without trailing slash
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Timeout in seconds for the whole upstream call (connect + read)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest inbound request body accepted, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            project: default_project(),
            log_dir: default_log_dir(),
            upstream_url: default_upstream_url(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_project() -> String {
    "default".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/data/api-logs")
}

fn default_upstream_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// Missing variables fall back to their defaults; present but malformed
    /// numeric values are rejected.
    ///
    /// ```no_run
    /// use api_traffic_logger::core::config::AppConfig;
    ///
    /// let config = AppConfig::from_env().expect("invalid configuration");
    /// println!("logging to {}/{}", config.log_dir.display(), config.project);
    /// ```
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = env_string("HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("PORT")? {
            config.server.port = port;
        }
        if let Some(project) = env_string("PROJECT_NAME") {
            config.project = project;
        }
        if let Some(log_dir) = env_string("LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }
        if let Some(url) = env_string("UPSTREAM_URL") {
            config.upstream_url = url;
        }
        if let Some(timeout) = env_parse::<u64>("REQUEST_TIMEOUT_SECS")? {
            config.request_timeout_secs = timeout;
        }
        if let Some(limit) = env_parse::<usize>("MAX_BODY_BYTES")? {
            config.max_body_bytes = limit;
        }

        config.normalize()?;
        Ok(config)
    }

    /// Trim and validate values that would otherwise produce broken paths or URLs.
    pub fn normalize(&mut self) -> Result<()> {
        self.project = self.project.trim().to_string();
        if self.project.is_empty() {
            bail!("PROJECT_NAME must not be empty");
        }
        if self.project.contains(|c: char| c == '/' || c == '\\')
            || self.project == "."
            || self.project == ".."
        {
            bail!("PROJECT_NAME must be a single path segment: {}", self.project);
        }

        let trimmed = self.upstream_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            bail!("UPSTREAM_URL must be an http(s) URL: {}", self.upstream_url);
        }
        self.upstream_url = trimmed.to_string();

        if self.request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    /// Full upstream URL for an inbound path-and-query.
    pub fn upstream_target(&self, path_and_query: &str) -> String {
        format!("{}{}", self.upstream_url, path_and_query)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        None => Ok(None),
    }
}
