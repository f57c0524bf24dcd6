//! Device WebSocket connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message};
use bytes::Bytes;
use statustag_core::ConnectionId;
use tokio::sync::mpsc;
use tracing::warn;

/// Message queued for the connection's write task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A framed protocol message.
    Binary(Bytes),
    /// Human-readable notice.
    Text(String),
    /// Liveness probe.
    Ping,
    /// Close frame; the write task stops after sending it.
    Close { code: u16, reason: &'static str },
}

impl Outbound {
    /// Convert to the axum message written on the socket.
    pub fn into_message(self) -> Message {
        match self {
            Self::Binary(bytes) => Message::Binary(bytes),
            Self::Text(text) => Message::Text(text.into()),
            Self::Ping => Message::Ping(Bytes::new()),
            Self::Close { code, reason } => Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })),
        }
    }
}

/// A connected device.
pub struct DeviceConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the connection's write task.
    tx: mpsc::Sender<Outbound>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the device has answered since the last heartbeat tick.
    pub is_alive: AtomicBool,
    /// Count of messages dropped due to a full or closed channel.
    dropped_messages: AtomicU64,
}

impl DeviceConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a message without waiting.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Outbound) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                warn!(connection_id = %self.id, "send queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Queue a framed protocol message.
    pub fn send_binary(&self, frame: Bytes) -> bool {
        self.send(Outbound::Binary(frame))
    }

    /// Queue a liveness probe.
    pub fn ping(&self) -> bool {
        self.send(Outbound::Ping)
    }

    /// Queue a close frame.
    pub fn close(&self, code: u16, reason: &'static str) -> bool {
        self.send(Outbound::Close { code, reason })
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the device answered since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
