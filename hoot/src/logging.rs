//! Tracing subscriber setup.
//!
//! Logs go to stderr with local-time timestamps. When a log directory is
//! configured, a second layer writes plain-text daily rolling files there
//! through a non-blocking writer; keep the returned [`LoggingGuard`] alive
//! until exit so buffered lines are flushed.
//!
//! The `HOOT_LOG` environment variable takes precedence over the configured
//! level and accepts full filter directives (`hoot=debug,reqwest=warn`).

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, time::OffsetTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable overriding the configured filter.
pub const LOG_ENV_VAR: &str = "HOOT_LOG";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Prefix of rolling log files (`hoot.log.2024-03-07`).
pub const LOG_FILE_PREFIX: &str = "hoot.log";

/// Logging settings, the `[logging]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter level or directives.
    pub level: String,
    /// Directory for rolling log files; stderr only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Keeps the file writer alive. Dropping it flushes pending log lines.
#[derive(Debug)]
pub struct LoggingGuard {
    file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Whether a file layer is active.
    pub fn writes_file(&self) -> bool {
        self.file_guard.is_some()
    }
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(std::env::var(LOG_ENV_VAR).ok(), &config.level);

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer.clone())
        .with_target(false);

    let (file_layer, file_guard) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| LoggingError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(timer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard {
        file_guard,
    })
}

/// Filter from the environment override, else the configured level.
fn build_filter(env_override: Option<String>, level: &str) -> EnvFilter {
    env_override
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.directory.is_none());
    }

    #[test]
    fn test_filter_uses_configured_level() {
        let filter = build_filter(None, "debug");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_filter_env_override_wins() {
        let filter = build_filter(Some("warn".to_string()), "debug");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_filter_ignores_malformed_override() {
        let filter = build_filter(Some("hoot=notalevel".to_string()), "error");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }
}
