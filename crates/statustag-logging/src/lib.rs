//! # statustag-logging
//!
//! `tracing` subscriber setup: an env-filtered text or JSON stdout layer,
//! plus an optional SQLite sink that keeps warn+ events searchable by
//! device id.

mod sqlite;

pub use sqlite::{LogQuery, LogRecord, SqliteLogLayer, SqliteLogSink};

use std::path::Path;
use std::sync::Arc;

use statustag_settings::{LogFormat, LoggingSettings};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Handle to the installed logging stack.
pub struct LoggingGuard {
    log_sink: Option<Arc<SqliteLogSink>>,
}

impl LoggingGuard {
    /// Access the log sink for querying persisted logs.
    pub fn logs(&self) -> Option<&SqliteLogSink> {
        self.log_sink.as_deref()
    }
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(settings: &LoggingSettings) -> String {
    let level = settings.level.trim();
    if level.is_empty() { "info".to_string() } else { level.to_lowercase() }
}

/// Install the global subscriber. Call once at startup.
pub fn init_subscriber(settings: &LoggingSettings) -> Result<LoggingGuard, TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(settings)));

    let fmt_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };

    // Optional SQLite log sink for warn+ logs
    let (sqlite_layer, log_sink) = match settings.db_path.as_deref() {
        Some(path) => match SqliteLogSink::new(Path::new(path)) {
            Ok(sink) => {
                let sink = Arc::new(sink);
                (Some(SqliteLogLayer::new(sink.clone())), Some(sink))
            }
            Err(e) => {
                eprintln!("statustag-logging: failed to open log DB {path}: {e}");
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .with(sqlite_layer)
        .try_init()?;

    Ok(LoggingGuard { log_sink })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_defaults_to_info() {
        let mut settings = LoggingSettings::default();
        assert_eq!(default_directive(&settings), "info");
        settings.level = "  ".into();
        assert_eq!(default_directive(&settings), "info");
        settings.level = "statustag_server=DEBUG".into();
        assert_eq!(default_directive(&settings), "statustag_server=debug");
    }
}
