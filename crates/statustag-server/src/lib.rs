//! # statustag-server
//!
//! Axum HTTP + `WebSocket` gateway streaming display patches to devices.
//!
//! - `/ws`: connect-parameter validation, per-device session with a poll
//!   loop, heartbeat, and pull servicing
//! - Session registry keyed by device id, with supersede-on-reconnect
//! - Bounded encoder pool running patch list builds off the async runtime
//! - `/health` and Prometheus `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod encoder;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, StatustagServer};
