//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Fails if another recorder was already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric names shared by the session and encoder paths.

/// Device WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Connections rejected for bad connect parameters (counter).
pub const WS_REJECTIONS_TOTAL: &str = "ws_rejections_total";
/// Session ends (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Session lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Devices with a live session (gauge).
pub const DEVICES_ACTIVE: &str = "devices_active";
/// Patch lists built (counter, labels: kind).
pub const PATCH_LISTS_BUILT_TOTAL: &str = "patch_lists_built_total";
/// Patch list builds that failed (counter).
pub const PATCH_LIST_FAILURES_TOTAL: &str = "patch_list_failures_total";
/// Patch list build time in seconds (histogram).
pub const PATCH_LIST_BUILD_SECONDS: &str = "patch_list_build_seconds";
/// Pull requests answered (counter, labels: result).
pub const PULL_REQUESTS_TOTAL: &str = "pull_requests_total";
/// NEW notifications pushed (counter).
pub const NOTIFICATIONS_SENT_TOTAL: &str = "notifications_sent_total";
/// Sessions dropped for missed heartbeats (counter).
pub const HEARTBEAT_TIMEOUTS_TOTAL: &str = "heartbeat_timeouts_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_REJECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            DEVICES_ACTIVE,
            PATCH_LISTS_BUILT_TOTAL,
            PATCH_LIST_FAILURES_TOTAL,
            PATCH_LIST_BUILD_SECONDS,
            PULL_REQUESTS_TOTAL,
            NOTIFICATIONS_SENT_TOTAL,
            HEARTBEAT_TIMEOUTS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name} is not snake_case"
            );
        }
    }

    #[test]
    fn counters_render_through_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(WS_REJECTIONS_TOTAL).increment(2);
        });
        assert!(render(&handle).contains("ws_rejections_total 2"));
    }
}
