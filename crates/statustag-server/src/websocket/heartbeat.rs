//! Heartbeat ping/pong liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::DeviceConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The device did not answer the previous ping.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Ping the device every `interval`.
///
/// Each tick first checks that the device answered since the previous tick,
/// then sends the next ping. The first tick fires one interval after start,
/// so a device that never answers is dropped after two intervals.
pub async fn run_heartbeat(
    connection: Arc<DeviceConnection>,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !connection.check_alive() {
                    return HeartbeatResult::TimedOut;
                }
                if !connection.ping() {
                    debug!(connection_id = %connection.id, "ping not queued");
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
