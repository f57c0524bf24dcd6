//! Server configuration.

use std::time::Duration;

use statustag_core::{AnimatedStrategy, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FILE_SIZE};
use statustag_settings::StatustagSettings;

/// Configuration for the statustag server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// How often each session asks the image source for the active image.
    pub poll_interval: Duration,
    /// Ping interval. A device missing one full interval is dropped.
    pub heartbeat_interval: Duration,
    /// Outbound queue depth per connection.
    pub send_queue: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// `bufferSize` applied when the device omits it.
    pub default_buffer_size: usize,
    /// `maxFileSize` applied when the device omits it.
    pub default_max_file_size: u64,
    /// Encoding used for animated sources.
    pub animated_strategy: AnimatedStrategy,
    /// Concurrent patch list builds across all sessions.
    pub encode_workers: usize,
}

impl ServerConfig {
    /// Derive the runtime config from loaded settings.
    pub fn from_settings(settings: &StatustagSettings) -> Self {
        let server = &settings.server;
        let streaming = &settings.streaming;
        Self {
            host: server.host.clone(),
            port: server.port,
            poll_interval: Duration::from_millis(server.poll_interval_ms),
            heartbeat_interval: Duration::from_millis(server.heartbeat_interval_ms),
            send_queue: server.send_queue,
            max_message_size: server.max_message_size,
            default_buffer_size: streaming.default_buffer_size,
            default_max_file_size: streaming.default_max_file_size,
            animated_strategy: streaming.animated_strategy,
            encode_workers: streaming.encode_workers.max(1),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
            send_queue: 256,
            max_message_size: 64 * 1024,
            default_buffer_size: DEFAULT_BUFFER_SIZE,
            default_max_file_size: DEFAULT_MAX_FILE_SIZE,
            animated_strategy: AnimatedStrategy::Frames,
            encode_workers: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_intervals() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_millis(5000));
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(10_000));
    }

    #[test]
    fn default_device_limits() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.default_buffer_size, 2500);
        assert_eq!(cfg.default_max_file_size, 2_000_000);
        assert_eq!(cfg.animated_strategy, AnimatedStrategy::Frames);
    }

    #[test]
    fn from_settings_copies_values() {
        let mut settings = StatustagSettings::default();
        settings.server.host = "0.0.0.0".into();
        settings.server.port = 9090;
        settings.server.poll_interval_ms = 250;
        settings.server.heartbeat_interval_ms = 750;
        settings.streaming.animated_strategy = AnimatedStrategy::Passthrough;
        settings.streaming.encode_workers = 2;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(750));
        assert_eq!(cfg.animated_strategy, AnimatedStrategy::Passthrough);
        assert_eq!(cfg.encode_workers, 2);
    }

    #[test]
    fn from_settings_keeps_at_least_one_worker() {
        let mut settings = StatustagSettings::default();
        settings.streaming.encode_workers = 0;
        assert_eq!(ServerConfig::from_settings(&settings).encode_workers, 1);
    }
}
