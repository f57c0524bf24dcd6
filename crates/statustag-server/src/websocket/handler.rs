//! WebSocket upgrade and the per-connection event loop.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use statustag_core::{ConnectionId, StreamError};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::connection::{DeviceConnection, Outbound};
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::params::{ConnectParams, ParamError};
use super::session::DeviceSession;
use crate::metrics::{
    DEVICES_ACTIVE, HEARTBEAT_TIMEOUTS_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_REJECTIONS_TOTAL,
};
use crate::server::AppState;

/// Close reason sent with a parameter rejection.
pub const REJECT_REASON: &str = "Required parameters missing or invalid";

/// How long a closing session waits for its close frame to be written.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Why a device session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The device closed the socket.
    ClientClosed,
    /// Read or write on the socket failed.
    TransportFault,
    /// The device stopped answering pings.
    LivenessTimeout,
    /// A newer connection claimed the same device id.
    Superseded,
    /// The server is shutting down.
    Shutdown,
}

impl DisconnectReason {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportFault => "transport_fault",
            Self::LivenessTimeout => "liveness_timeout",
            Self::Superseded => "superseded",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether the server sends a close frame before dropping the socket.
    fn closes_gracefully(self) -> bool {
        matches!(self, Self::Superseded | Self::Shutdown)
    }
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let params = ConnectParams::parse(&query);
    let shutdown = state.shutdown.clone();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            shutdown.track(async move {
                match params {
                    Ok(params) => run_device_session(socket, params, state).await,
                    Err(err) => reject(socket, &err).await,
                }
            })
        })
}

/// Send a notice and close with a policy violation. No session is created.
async fn reject(mut socket: WebSocket, err: &ParamError) {
    counter!(WS_REJECTIONS_TOTAL).increment(1);
    let stream_err = StreamError::from(err.clone());
    info!(key = err.key(), error = %stream_err, "connection rejected");

    let notice = format!("Connection rejected - {err}");
    if socket.send(Message::Text(notice.into())).await.is_ok() {
        let close = Outbound::Close {
            code: close_code::POLICY,
            reason: REJECT_REASON,
        };
        let _ = socket.send(close.into_message()).await;
    }
}

/// Why the outbound writer stopped.
#[derive(Debug)]
enum WriterExit {
    /// The queue closed or a close frame was written.
    Drained,
    /// Writing to the socket failed.
    Failed(String),
}

/// Drain the outbound queue onto the socket.
async fn write_outbound<S>(mut sink: S, mut rx: mpsc::Receiver<Outbound>) -> WriterExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(outbound) = rx.recv().await {
        let closing = matches!(outbound, Outbound::Close { .. });
        if let Err(e) = sink.send(outbound.into_message()).await {
            return WriterExit::Failed(e.to_string());
        }
        if closing {
            break;
        }
    }
    WriterExit::Drained
}

async fn run_device_session(socket: WebSocket, params: ConnectParams, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();
    drive_session(ws_sink, ws_stream, params, state).await;
}

/// Drive one device connection until it closes.
#[instrument(skip_all, fields(device_id = %params.device_id, connection_id))]
async fn drive_session<Si, St, E>(ws_sink: Si, mut ws_stream: St, params: ConnectParams, state: AppState)
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let connection_id = ConnectionId::new();
    let _ = tracing::Span::current().record("connection_id", connection_id.as_str());

    let target = params.into_target(
        state.config.default_buffer_size,
        state.config.default_max_file_size,
    );
    let device_id = target.device_id.clone();
    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    let _ = state.connections.fetch_add(1, Ordering::Relaxed);
    info!(
        width = target.width,
        height = target.height,
        buffer_size = target.buffer_size,
        max_file_size = target.max_file_size,
        "device connected"
    );

    let slot = state
        .registry
        .claim(device_id.clone(), connection_id.clone(), &state.shutdown.token());
    gauge!(DEVICES_ACTIVE).set(state.registry.len() as f64);
    let cancel = slot.cancel_token().clone();

    let (tx, rx) = mpsc::channel::<Outbound>(state.config.send_queue);
    let connection = Arc::new(DeviceConnection::new(connection_id, tx));
    let mut writer = tokio::spawn(write_outbound(ws_sink, rx));
    let mut writer_running = true;

    let session = Arc::new(DeviceSession::new(
        target,
        slot.clone(),
        connection.clone(),
        state.source.clone(),
        state.encoder.clone(),
    ));
    let _ = session.activate().await;

    let poll = tokio::spawn(
        session
            .clone()
            .run_poll_loop(state.config.poll_interval, cancel.clone()),
    );
    let heartbeat = run_heartbeat(
        connection.clone(),
        state.config.heartbeat_interval,
        cancel.clone(),
    );
    tokio::pin!(heartbeat);

    // Inbound: pulls are answered in arrival order
    let reason = loop {
        tokio::select! {
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Binary(payload))) => {
                    let _ = session.handle_pull(&payload);
                }
                Some(Ok(Message::Pong(_))) => connection.mark_alive(),
                Some(Ok(Message::Text(text))) => {
                    debug!(len = text.len(), "ignoring text message");
                }
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Close(_))) | None => break DisconnectReason::ClientClosed,
                Some(Err(e)) => {
                    let err = StreamError::TransportFault(e.to_string());
                    warn!(error = %err, "websocket receive failed");
                    break DisconnectReason::TransportFault;
                }
            },
            result = &mut heartbeat => match result {
                HeartbeatResult::TimedOut => {
                    let err = StreamError::LivenessTimeout(device_id.clone());
                    warn!(error = %err, "heartbeat missed; terminating connection");
                    counter!(HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                    break DisconnectReason::LivenessTimeout;
                }
                HeartbeatResult::Cancelled => break cancel_reason(&state),
            },
            () = cancel.cancelled() => break cancel_reason(&state),
            exit = &mut writer, if writer_running => {
                writer_running = false;
                let detail = match exit {
                    Ok(WriterExit::Failed(e)) => e,
                    Ok(WriterExit::Drained) => "outbound queue closed".to_owned(),
                    Err(e) => e.to_string(),
                };
                let err = StreamError::TransportFault(detail);
                warn!(error = %err, "websocket send failed");
                break DisconnectReason::TransportFault;
            }
        }
    };

    // Cleanup: stop timers, drop cached state, release the registry slot
    cancel.cancel();
    session.close();
    if let Err(e) = poll.await {
        warn!(error = %e, "poll task failed");
    }

    if writer_running {
        if reason.closes_gracefully() {
            let _ = connection.close(close_code::NORMAL, reason.as_str());
            if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                writer.abort();
            }
        } else {
            writer.abort();
        }
    }

    let released = state.registry.release(&slot);
    gauge!(DEVICES_ACTIVE).set(state.registry.len() as f64);
    let _ = state.connections.fetch_sub(1, Ordering::Relaxed);
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    info!(
        reason = reason.as_str(),
        released,
        dropped_messages = connection.drop_count(),
        duration_ms = started.elapsed().as_millis() as u64,
        "device disconnected"
    );
    drop(ws_stream);
}

fn cancel_reason(state: &AppState) -> DisconnectReason {
    if state.shutdown.is_shutting_down() {
        DisconnectReason::Shutdown
    } else {
        DisconnectReason::Superseded
    }
}
