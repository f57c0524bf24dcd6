//! Settings types.
//!
//! Every struct uses `#[serde(rename_all = "camelCase", default)]` so a
//! partial JSON file fills the rest from compiled defaults.

mod server;
mod streaming;

pub use server::ServerSettings;
pub use streaming::StreamingSettings;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatustagSettings {
    /// Listener and timers.
    pub server: ServerSettings,
    /// Encoding defaults.
    pub streaming: StreamingSettings,
    /// Image store.
    pub store: StoreSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl StatustagSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.server.poll_interval_ms == 0, "server.pollIntervalMs must be positive"),
            (
                self.server.heartbeat_interval_ms == 0,
                "server.heartbeatIntervalMs must be positive",
            ),
            (self.server.send_queue == 0, "server.sendQueue must be positive"),
            (
                self.streaming.default_buffer_size == 0,
                "streaming.defaultBufferSize must be positive",
            ),
            (
                self.streaming.default_max_file_size == 0,
                "streaming.defaultMaxFileSize must be positive",
            ),
            (self.streaming.encode_workers == 0, "streaming.encodeWorkers must be positive"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(SettingsError::InvalidValue((*msg).to_string())),
            None => Ok(()),
        }
    }
}

/// SQLite image store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Database file.
    pub db_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: crate::loader::statustag_home()
                .join("database")
                .join("statustag.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional SQLite file receiving warn+ events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            db_path: None,
        }
    }
}
