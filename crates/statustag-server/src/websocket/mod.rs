//! Device WebSocket gateway.
//!
//! - [`params`]: connect query validation
//! - [`connection`]: outbound queue and liveness flag
//! - [`heartbeat`]: ping/pong fault detection
//! - [`session`]: poll loop, patch list lifecycle, pull servicing
//! - [`handler`]: axum upgrade and per-connection event loop

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod params;
pub mod session;
