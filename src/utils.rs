//! Utility functions and helpers
//!
//! Logging setup and the small text helpers the terminal frontend shares.

use crate::config::{LogFormat, LogLevel};
use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Display format for timestamps
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Initialize the global subscriber.
///
/// The terminal frontend owns stdout, so logs go to stderr unless a log file
/// is configured. `RUST_LOG` overrides `level` when set. The returned guard
/// must stay alive for the file writer to flush.
pub fn init_logging(
    level: LogLevel,
    format: LogFormat,
    file: Option<&Path>,
) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let (writer, guard) = match file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_ansi(file.is_none())
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

/// Render an authority timestamp in local time, or return it unchanged if it
/// does not parse
pub fn format_date(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Local).format(DATE_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return parsed.format(DATE_FORMAT).to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date_naive() {
        assert_eq!(format_date("2025-09-01T10:02:03"), "2025-09-01 10:02:03");
        assert_eq!(format_date("2025-09-01 10:02:03.250"), "2025-09-01 10:02:03");
    }

    #[test]
    fn test_format_date_with_offset() {
        let formatted = format_date("2025-09-01T10:02:03Z");
        assert_eq!(formatted.len(), "2025-09-01 10:02:03".len());
        assert!(formatted.ends_with(":03"));
    }

    #[test]
    fn test_format_date_fallback() {
        assert_eq!(format_date("yesterday"), "yesterday");
        assert_eq!(format_date(""), "");
    }
}
