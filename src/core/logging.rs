//! Operational logging setup.
//!
//! This is the process's console output (tracing), separate from the JSONL
//! traffic log written by [`crate::core::jsonl_logger`].

use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filters always appended so HTTP library internals stay quiet.
const NOISE_FILTERS: &str = "hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn";

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Build the filter from `RUST_LOG` (or the crate default) plus the noise filters.
pub fn build_filter(rust_log: Option<&str>) -> EnvFilter {
    let base = rust_log
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("info,api_traffic_logger=debug");
    EnvFilter::new(format!("{},{}", base, NOISE_FILTERS))
}

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` selects JSON lines, `NO_COLOR` disables ANSI colours.
pub fn init_tracing() {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let no_color = std::env::var("NO_COLOR").is_ok();

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(LocalTime),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime)
                    .with_ansi(!no_color),
            )
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}

/// Generate a new unique request ID using UUID v4.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
