//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open device WebSocket connections.
    pub connections: usize,
    /// Devices with a registered session.
    pub devices: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, devices: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        devices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), 0, 0);
        assert_eq!(resp.status, "ok");
    }

    #[test]
    fn uptime_starts_at_zero() {
        let resp = health_check(Instant::now(), 0, 0);
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn counts_are_passed_through() {
        let resp = health_check(Instant::now(), 3, 2);
        assert_eq!(resp.connections, 3);
        assert_eq!(resp.devices, 2);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(health_check(Instant::now(), 1, 1)).unwrap();
        assert!(json.get("uptimeSecs").is_some());
        assert!(json.get("uptime_secs").is_none());
        assert_eq!(json["devices"], 1);
    }
}
