//! Network and session timing settings.

use serde::{Deserialize, Serialize};

/// HTTP/WebSocket listener and per-connection timers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Interval between active-image polls, per connection.
    pub poll_interval_ms: u64,
    /// Interval between liveness probes, per connection.
    pub heartbeat_interval_ms: u64,
    /// Outbound messages buffered per connection before backpressure.
    pub send_queue: usize,
    /// Largest inbound WebSocket message accepted.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            poll_interval_ms: 5_000,
            heartbeat_interval_ms: 10_000,
            send_queue: 256,
            max_message_size: 64 * 1024,
        }
    }
}
