use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the crate's own targets (default: INFO)
    pub level: Level,
    /// Emit JSON lines instead of text (default: false)
    pub json_format: bool,
    /// Directory for daily rolling log files. None logs to stdout only
    pub log_dir: Option<String>,
    /// Colorize stdout (default: true)
    pub colorize: bool,
    /// File name prefix inside `log_dir` (default: "omomuki")
    pub log_file_name: String,
    /// Targets the level applies to (default: "omomuki_rs", "actix_web")
    pub log_targets: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "omomuki".to_string(),
            log_targets: vec!["omomuki_rs".to_string(), "actix_web".to_string()],
        }
    }
}

impl LoggingConfig {
    /// `RUST_LOG`-style directive used when the environment sets none.
    pub fn filter_directive(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        self.log_targets
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Keeps the file writer thread alive; drop it only at shutdown.
#[allow(dead_code)]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. Calling it again is harmless: later
/// calls leave the first subscriber in place.
pub fn init_logging(config: LoggingConfig) -> LogGuard {
    // actix and reqwest log through the `log` facade
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let mut layers = Vec::new();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_target(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));
    layers.push(if config.json_format {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    });

    let mut file_guard = None;
    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory {}: {}", log_dir.display(), e);
            return LogGuard { _file_guard: None };
        }

        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, &config.log_file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
            .with_writer(writer);
        layers.push(if config.json_format {
            file_layer.json().flatten_event(true).boxed()
        } else {
            file_layer.boxed()
        });
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        let config = LoggingConfig {
            level: Level::DEBUG,
            ..Default::default()
        };
        assert_eq!(config.filter_directive(), "omomuki_rs=debug,actix_web=debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let _first = init_logging(LoggingConfig::default());
        let _second = init_logging(LoggingConfig {
            json_format: true,
            ..Default::default()
        });
    }
}
