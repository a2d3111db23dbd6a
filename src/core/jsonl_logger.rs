//! Per-project, per-day JSONL traffic log.
//!
//! Each proxied exchange becomes one [`LogEntry`] serialized on its own line in
//! `<log_dir>/<project>/api-log-<YYYY-MM-DD>.jsonl`. The date is taken from the
//! local clock on every write, so files roll over at local midnight without any
//! state tracking the current file.

use crate::core::config::AppConfig;
use crate::core::error::Result;
use crate::core::summary::{RequestSummary, ResponseSummary};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

// ============================================================================
// Record Type
// ============================================================================

/// One proxied exchange, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local wall-clock time the entry was built (RFC 3339 with offset)
    pub timestamp: DateTime<Local>,
    /// Project this proxy instance serves
    pub project: String,
    /// `model` field of the request body, empty if unavailable
    pub model: String,
    /// Text of the last request message, at most 500 characters
    pub prompt_preview: String,
    /// Text of the response, at most 500 characters
    pub response_preview: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Time from reading the request to receiving the full upstream response
    pub duration_ms: u64,
    /// Upstream status, or the status the proxy answered with itself
    pub status_code: u16,
    /// Inbound path and query, unmodified
    pub path: String,
}

impl LogEntry {
    /// Start an entry for a request; response fields stay empty until filled in.
    pub fn new(project: &str, path: &str, request: RequestSummary) -> Self {
        Self {
            timestamp: Local::now(),
            project: project.to_string(),
            model: request.model,
            prompt_preview: request.prompt_preview,
            response_preview: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            status_code: 0,
            path: path.to_string(),
        }
    }

    /// Record an upstream response.
    pub fn with_response(mut self, status_code: u16, response: ResponseSummary) -> Self {
        self.status_code = status_code;
        self.response_preview = response.response_preview;
        self.input_tokens = response.input_tokens;
        self.output_tokens = response.output_tokens;
        self
    }

    /// Record an exchange the proxy answered itself.
    pub fn with_failure(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self.response_preview.clear();
        self.input_tokens = 0;
        self.output_tokens = 0;
        self
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Append-only writer for one project's daily log files.
///
/// Appends are serialized through an async mutex and each record is issued as
/// a single write on an `O_APPEND` handle, so concurrent requests never
/// interleave partial lines.
pub struct JsonlLogger {
    project_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlLogger {
    /// Create a writer for `<log_dir>/<project>`. Nothing is touched on disk yet.
    pub fn new(log_dir: impl AsRef<Path>, project: &str) -> Self {
        Self {
            project_dir: log_dir.as_ref().join(project),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.log_dir, &config.project)
    }

    /// Directory holding the daily files.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// File that entries written on `date` go to.
    pub fn log_path_for(&self, date: NaiveDate) -> PathBuf {
        self.project_dir
            .join(format!("api-log-{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// File that an entry written now would go to.
    pub fn current_log_path(&self) -> PathBuf {
        self.log_path_for(Local::now().date_naive())
    }

    /// Create the project directory ahead of the first write.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.project_dir).await?;
        Ok(())
    }

    /// Append `entry` to today's file and return the file's path.
    pub async fn append(&self, entry: &LogEntry) -> Result<PathBuf> {
        self.append_on(Local::now().date_naive(), entry).await
    }

    /// Append `entry` to the file for `date`.
    pub async fn append_on(&self, date: NaiveDate, entry: &LogEntry) -> Result<PathBuf> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let path = self.log_path_for(date);

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.project_dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        Ok(path)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_entry(path: &str) -> LogEntry {
        LogEntry::new(
            "demo",
            path,
            RequestSummary {
                model: "claude-3-haiku".to_string(),
                prompt_preview: "hello".to_string(),
            },
        )
        .with_response(
            200,
            ResponseSummary {
                response_preview: "hi there".to_string(),
                input_tokens: 3,
                output_tokens: 5,
            },
        )
        .with_duration(Duration::from_millis(42))
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_log_path_layout() {
        let logger = JsonlLogger::new("/data/api-logs", "demo");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            logger.log_path_for(date),
            PathBuf::from("/data/api-logs/demo/api-log-2024-03-09.jsonl")
        );
    }

    #[test]
    fn test_entry_serialization_fields() {
        let entry = sample_entry("/v1/messages?beta=true");
        let value = serde_json::to_value(&entry).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "duration_ms",
                "input_tokens",
                "model",
                "output_tokens",
                "path",
                "project",
                "prompt_preview",
                "response_preview",
                "status_code",
                "timestamp",
            ]
        );
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["duration_ms"], 42);
        assert_eq!(value["path"], "/v1/messages?beta=true");
        assert!(DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_failure_clears_response_fields() {
        let entry = sample_entry("/v1/messages").with_failure(502);
        assert_eq!(entry.status_code, 502);
        assert_eq!(entry.input_tokens, 0);
        assert_eq!(entry.output_tokens, 0);
        assert_eq!(entry.response_preview, "");
        assert_eq!(entry.prompt_preview, "hello");
    }

    #[tokio::test]
    async fn test_append_creates_directories_lazily() {
        let dir = TempDir::new().unwrap();
        let logger = JsonlLogger::new(dir.path().join("nested"), "demo");
        assert!(!logger.project_dir().exists());

        let path = logger.append(&sample_entry("/v1/messages")).await.unwrap();
        assert_eq!(path, logger.current_log_path());
        assert!(path.exists());

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        let parsed: LogEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.model, "claude-3-haiku");
        assert_eq!(parsed.input_tokens, 3);
    }

    #[tokio::test]
    async fn test_append_never_rewrites_existing_lines() {
        let dir = TempDir::new().unwrap();
        let logger = JsonlLogger::new(dir.path(), "demo");
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let path = logger
            .append_on(date, &sample_entry("/first"))
            .await
            .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();
        logger
            .append_on(date, &sample_entry("/second"))
            .await
            .unwrap();
        let after = std::fs::read_to_string(&path).unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(read_lines(&path).len(), 2);
    }

    #[tokio::test]
    async fn test_new_date_writes_new_file() {
        let dir = TempDir::new().unwrap();
        let logger = JsonlLogger::new(dir.path(), "demo");
        let day_one = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let day_two = day_one.succ_opt().unwrap();

        let first = logger
            .append_on(day_one, &sample_entry("/before-midnight"))
            .await
            .unwrap();
        let snapshot = std::fs::read_to_string(&first).unwrap();
        let second = logger
            .append_on(day_two, &sample_entry("/after-midnight"))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("api-log-2024-06-01.jsonl"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), snapshot);
        assert_eq!(read_lines(&second).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let logger = Arc::new(JsonlLogger::new(dir.path(), "demo"));
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let logger = logger.clone();
                tokio::spawn(async move {
                    let mut entry = sample_entry(&format!("/req/{}", i));
                    entry.prompt_preview = "p".repeat(500);
                    logger.append_on(date, &entry).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let lines = read_lines(&logger.log_path_for(date));
        assert_eq!(lines.len(), 64);
        let mut paths: Vec<String> = lines
            .iter()
            .map(|line| serde_json::from_str::<LogEntry>(line).unwrap().path)
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 64);
    }
}
