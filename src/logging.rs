//! Logging setup
//!
//! Everything goes to a daily-rolling file so the terminal stays reserved
//! for the chat. `RUST_LOG` controls the filter; `DEV_AGENT_LOG_FORMAT=json`
//! switches to JSON lines; `DEV_AGENT_LOG_DIR` moves the files.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "dev_agent=info";

/// Environment variable selecting the log format
pub const LOG_FORMAT_VAR: &str = "DEV_AGENT_LOG_FORMAT";

/// Environment variable selecting the log directory
pub const LOG_DIR_VAR: &str = "DEV_AGENT_LOG_DIR";

const LOG_FILE_PREFIX: &str = "dev-agent.log";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        match lookup(LOG_FORMAT_VAR) {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

fn log_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(LOG_DIR_VAR)
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber
///
/// The returned guard flushes buffered lines when dropped; keep it alive
/// for the whole program.
pub fn init_logging() -> Result<WorkerGuard> {
    init_logging_with(|key| std::env::var(key).ok())
}

/// Install the global subscriber, reading settings through `lookup`
pub fn init_logging_with(lookup: impl Fn(&str) -> Option<String>) -> Result<WorkerGuard> {
    let dir = log_dir(&lookup);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match LogFormat::from_lookup(&lookup) {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .try_init(),
    }
    .context("Failed to install log subscriber")?;

    tracing::info!("Logging to {}", dir.display());

    Ok(guard)
}
