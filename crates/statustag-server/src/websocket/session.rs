//! Per-connection device session: polling, patch list lifecycle, pulls.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use statustag_core::protocol::{self, Frame};
use statustag_core::{DisplayTarget, ImageIdentity, ImageSource, StreamError};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::connection::DeviceConnection;
use crate::encoder::EncoderPool;
use crate::metrics::{NOTIFICATIONS_SENT_TOTAL, PULL_REQUESTS_TOTAL};
use crate::registry::DeviceSlot;

/// Lifecycle of a session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// Result of one poll of the image source.
#[derive(Debug)]
pub enum PollOutcome {
    /// New identity; the patch list was replaced and NEW was pushed.
    Rebuilt {
        identity: ImageIdentity,
        patches: usize,
    },
    /// Identity matches the current patch list.
    Unchanged,
    /// The source has no active image for this device.
    Unavailable,
    /// The source or the encoder failed; the previous list is kept.
    Failed(StreamError),
    /// The session closed before the poll finished.
    Closed,
}

/// How a pull request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Sent the patch at this index.
    Served(u16),
    /// Index past the end; sent EOF.
    Eof(u16),
    /// No patch list yet; nothing sent.
    Pending,
    /// Payload was not exactly two bytes; nothing sent.
    Malformed,
    /// The reply for this index could not be queued.
    Dropped(u16),
}

impl PullOutcome {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Served(_) => "served",
            Self::Eof(_) => "eof",
            Self::Pending => "pending",
            Self::Malformed => "malformed",
            Self::Dropped(_) => "dropped",
        }
    }
}

/// State and behaviour of one device connection.
pub struct DeviceSession {
    target: DisplayTarget,
    slot: Arc<DeviceSlot>,
    connection: Arc<DeviceConnection>,
    source: Arc<dyn ImageSource>,
    encoder: EncoderPool,
    state: Mutex<SessionState>,
}

impl DeviceSession {
    /// New session in `Connecting`.
    pub fn new(
        target: DisplayTarget,
        slot: Arc<DeviceSlot>,
        connection: Arc<DeviceConnection>,
        source: Arc<dyn ImageSource>,
        encoder: EncoderPool,
    ) -> Self {
        Self {
            target,
            slot,
            connection,
            source,
            encoder,
            state: Mutex::new(SessionState::Connecting),
        }
    }

    /// Display this session serves.
    pub fn target(&self) -> &DisplayTarget {
        &self.target
    }

    /// Registry slot backing this session.
    pub fn slot(&self) -> &Arc<DeviceSlot> {
        &self.slot
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Record the device geometry and enter `Active`.
    ///
    /// A failed registration is logged; streaming proceeds regardless.
    pub async fn activate(&self) -> SessionState {
        let device = &self.target.device_id;
        if let Err(e) = self
            .source
            .register_device(device, self.target.width, self.target.height)
            .await
        {
            warn!(device_id = %device, error = %e, "failed to record device geometry");
        }

        let mut state = self.state.lock();
        if *state == SessionState::Connecting {
            *state = SessionState::Active;
        }
        *state
    }

    /// Ask the source for the active image and rebuild on identity change.
    pub async fn poll_once(&self) -> PollOutcome {
        if self.state() == SessionState::Closed {
            return PollOutcome::Closed;
        }
        let device = &self.target.device_id;

        let image = match self.source.active_image(device).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                debug!(device_id = %device, "no active image");
                return PollOutcome::Unavailable;
            }
            Err(e) => {
                warn!(device_id = %device, error = %e, "image source failed");
                return PollOutcome::Failed(e.into());
            }
        };

        if self.slot.last_seen().as_ref() == Some(&image.identity) {
            trace!(device_id = %device, identity = %image.identity, "active image unchanged");
            return PollOutcome::Unchanged;
        }

        let identity = image.identity.clone();
        let list = match self.encoder.build(image, self.target.clone()).await {
            Ok(list) => list.shared(),
            Err(e) => {
                warn!(
                    device_id = %device,
                    identity = %identity,
                    error = %e,
                    kind = e.error_kind(),
                    "patch list rebuild failed; keeping previous list"
                );
                return PollOutcome::Failed(e);
            }
        };
        let patches = list.len();

        // Swap the list and push NEW under the device lock so no pull is
        // answered from the new list before the device sees NEW.
        let notified = {
            let state = self.state.lock();
            if *state == SessionState::Closed {
                return PollOutcome::Closed;
            }
            self.slot.with_cache(|cache| {
                cache.last_seen = Some(identity.clone());
                cache.patches = Some(list);
                self.connection.send_binary(Frame::New.encode())
            })
        };

        if notified {
            counter!(NOTIFICATIONS_SENT_TOTAL).increment(1);
        } else {
            warn!(device_id = %device, identity = %identity, "NEW notification dropped");
        }
        info!(device_id = %device, identity = %identity, patches, "active image changed");
        PollOutcome::Rebuilt { identity, patches }
    }

    /// Poll immediately, then every `interval`, until `cancel` fires.
    pub async fn run_poll_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        outcome = self.poll_once() => {
                            if matches!(outcome, PollOutcome::Closed) {
                                break;
                            }
                        }
                    }
                }
            }
        }
        debug!(device_id = %self.target.device_id, "poll loop stopped");
    }

    /// Answer one inbound pull request.
    pub fn handle_pull(&self, payload: &[u8]) -> PullOutcome {
        let outcome = match protocol::parse_pull(payload) {
            None => {
                debug!(
                    device_id = %self.target.device_id,
                    len = payload.len(),
                    "ignoring pull request with bad length"
                );
                PullOutcome::Malformed
            }
            Some(seq) => self.slot.with_cache(|cache| {
                let Some(list) = cache.patches.as_ref() else {
                    return PullOutcome::Pending;
                };
                let (frame, answered) = match list.get(usize::from(seq)) {
                    Some(patch) => (protocol::encode_patch(patch), PullOutcome::Served(seq)),
                    None => (Frame::Eof.encode(), PullOutcome::Eof(seq)),
                };
                if self.connection.send_binary(frame) {
                    answered
                } else {
                    PullOutcome::Dropped(seq)
                }
            }),
        };

        match outcome {
            PullOutcome::Eof(seq) => {
                debug!(device_id = %self.target.device_id, seq, "pull past end; sent EOF");
            }
            PullOutcome::Pending => {
                trace!(device_id = %self.target.device_id, "pull before first patch list");
            }
            PullOutcome::Dropped(seq) => {
                warn!(device_id = %self.target.device_id, seq, "pull reply dropped");
            }
            _ => {}
        }
        counter!(PULL_REQUESTS_TOTAL, "result" => outcome.as_str()).increment(1);
        outcome
    }

    /// Enter `Closed` and drop the cached patch list and identity.
    pub fn close(&self) {
        let mut state = self.state.lock();
        *state = SessionState::Closed;
        self.slot.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use image::{ImageFormat as Codec, Rgb, RgbImage};
    use statustag_core::{AnimatedStrategy, ConnectionId, DeviceId};
    use statustag_store::MemoryImageSource;
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::SessionRegistry;
    use crate::websocket::connection::Outbound;

    struct Harness {
        session: Arc<DeviceSession>,
        source: Arc<MemoryImageSource>,
        registry: SessionRegistry,
        rx: mpsc::Receiver<Outbound>,
    }

    fn png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(rgb));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, Codec::Png).unwrap();
        out.into_inner()
    }

    fn harness(buffer_size: usize) -> Harness {
        let source = Arc::new(MemoryImageSource::new());
        let registry = SessionRegistry::new();
        let slot = registry.claim("dev1".into(), ConnectionId::new(), &CancellationToken::new());
        let (tx, rx) = mpsc::channel(64);
        let connection = Arc::new(DeviceConnection::new(slot.connection_id().clone(), tx));
        let target = DisplayTarget::new("dev1", 100, 50).with_buffer_size(buffer_size);
        let session = Arc::new(DeviceSession::new(
            target,
            slot,
            connection,
            source.clone(),
            EncoderPool::new(1, AnimatedStrategy::Frames),
        ));
        Harness { session, source, registry, rx }
    }

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn new_frame() -> Outbound {
        Outbound::Binary(Frame::New.encode())
    }

    #[tokio::test]
    async fn activate_records_geometry() {
        let h = harness(300);
        assert_eq!(h.session.state(), SessionState::Connecting);
        assert_eq!(h.session.activate().await, SessionState::Active);
        assert_eq!(h.source.geometry(&DeviceId::from("dev1")), Some((100, 50)));
    }

    #[tokio::test]
    async fn activate_tolerates_source_failure() {
        let h = harness(300);
        h.source.set_failing(true);
        assert_eq!(h.session.activate().await, SessionState::Active);
    }

    #[tokio::test]
    async fn no_image_sends_nothing() {
        let mut h = harness(300);
        assert_matches!(h.session.poll_once().await, PollOutcome::Unavailable);
        assert!(drain(&mut h.rx).is_empty());
        assert_eq!(h.session.handle_pull(&protocol::encode_pull(0)), PullOutcome::Pending);
        assert!(drain(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn new_identity_rebuilds_and_notifies_once() {
        let mut h = harness(300);
        let _ = h.source.set_active("dev1", png(100, 50, [255, 0, 0]));

        let first = h.session.poll_once().await;
        assert_matches!(first, PollOutcome::Rebuilt { patches, .. } if patches > 0);
        assert_eq!(drain(&mut h.rx), vec![new_frame()]);
        let before = h.session.slot().patch_list().unwrap();

        assert_matches!(h.session.poll_once().await, PollOutcome::Unchanged);
        assert!(drain(&mut h.rx).is_empty());
        assert!(Arc::ptr_eq(&before, &h.session.slot().patch_list().unwrap()));

        let _ = h.source.set_active("dev1", png(100, 50, [0, 255, 0]));
        assert_matches!(h.session.poll_once().await, PollOutcome::Rebuilt { .. });
        assert_eq!(drain(&mut h.rx), vec![new_frame()]);
        assert!(!Arc::ptr_eq(&before, &h.session.slot().patch_list().unwrap()));
    }

    #[tokio::test]
    async fn pulls_walk_the_list_then_eof() {
        let mut h = harness(300);
        let _ = h.source.set_active("dev1", png(100, 50, [0, 0, 255]));
        let _ = h.session.poll_once().await;
        let _ = drain(&mut h.rx);

        let list = h.session.slot().patch_list().unwrap();
        // (300 - 10) / 200 = 1 row per band
        assert_eq!(list.len(), 50);

        for seq in 0..list.len() as u16 {
            assert_eq!(h.session.handle_pull(&protocol::encode_pull(seq)), PullOutcome::Served(seq));
            let sent = drain(&mut h.rx);
            let [Outbound::Binary(frame)] = sent.as_slice() else {
                panic!("expected one binary frame, got {sent:?}");
            };
            assert!(frame.len() <= 300);
            assert_eq!(frame, &protocol::encode_patch(list.get(usize::from(seq)).unwrap()));
        }

        assert_eq!(h.session.handle_pull(&protocol::encode_pull(50)), PullOutcome::Eof(50));
        assert_eq!(h.session.handle_pull(&protocol::encode_pull(u16::MAX)), PullOutcome::Eof(u16::MAX));
        assert_eq!(
            drain(&mut h.rx),
            vec![Outbound::Binary(Frame::Eof.encode()), Outbound::Binary(Frame::Eof.encode())]
        );
    }

    #[tokio::test]
    async fn unqueued_pull_reply_is_reported() {
        let h = harness(300);
        let _ = h.source.set_active("dev1", png(100, 50, [0, 0, 255]));
        let _ = h.session.poll_once().await;
        drop(h.rx);

        assert_eq!(h.session.handle_pull(&protocol::encode_pull(0)), PullOutcome::Dropped(0));
        assert_eq!(h.session.handle_pull(&protocol::encode_pull(900)), PullOutcome::Dropped(900));
        assert_eq!(PullOutcome::Dropped(0).as_str(), "dropped");
    }

    #[tokio::test]
    async fn bad_pull_length_ignored() {
        let mut h = harness(300);
        let _ = h.source.set_active("dev1", png(100, 50, [0, 0, 255]));
        let _ = h.session.poll_once().await;
        let _ = drain(&mut h.rx);

        assert_eq!(h.session.handle_pull(&[0]), PullOutcome::Malformed);
        assert_eq!(h.session.handle_pull(&[0, 0, 0]), PullOutcome::Malformed);
        assert!(drain(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn unavailable_keeps_previous_list() {
        let mut h = harness(300);
        let _ = h.source.set_active("dev1", png(100, 50, [9, 9, 9]));
        let _ = h.session.poll_once().await;
        let _ = drain(&mut h.rx);

        h.source.clear_active(&"dev1".into());
        assert_matches!(h.session.poll_once().await, PollOutcome::Unavailable);
        assert!(h.session.slot().patch_list().is_some());
        assert_eq!(h.session.handle_pull(&protocol::encode_pull(0)), PullOutcome::Served(0));
    }

    #[tokio::test]
    async fn decode_failure_keeps_previous_list() {
        let mut h = harness(300);
        let good = h.source.set_active("dev1", png(100, 50, [1, 2, 3]));
        let _ = h.session.poll_once().await;
        let _ = drain(&mut h.rx);

        let _ = h.source.set_active("dev1", Bytes::from_static(b"garbage"));
        assert_matches!(
            h.session.poll_once().await,
            PollOutcome::Failed(StreamError::DecodeFailure { .. })
        );
        assert!(drain(&mut h.rx).is_empty());
        assert_eq!(h.session.slot().last_seen(), Some(good));
        assert!(h.session.slot().patch_list().is_some());
    }

    #[tokio::test]
    async fn source_error_is_not_fatal() {
        let h = harness(300);
        h.source.set_failing(true);
        let outcome = h.session.poll_once().await;
        assert_matches!(outcome, PollOutcome::Failed(ref e) if !e.closes_session());
    }

    #[tokio::test]
    async fn close_discards_state() {
        let mut h = harness(300);
        let _ = h.source.set_active("dev1", png(100, 50, [0, 0, 0]));
        let _ = h.session.poll_once().await;
        let _ = drain(&mut h.rx);

        h.session.close();
        assert_eq!(h.session.state(), SessionState::Closed);
        assert!(h.session.slot().patch_list().is_none());
        assert!(h.session.slot().last_seen().is_none());
        assert_matches!(h.session.poll_once().await, PollOutcome::Closed);
        assert_eq!(h.session.handle_pull(&protocol::encode_pull(0)), PullOutcome::Pending);
        assert!(h.registry.contains(&"dev1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_loop_runs_immediately_then_on_interval() {
        let mut h = harness(300);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(h.session.clone().run_poll_loop(Duration::from_secs(5), cancel.clone()));

        // First poll: nothing active yet
        time::sleep(Duration::from_millis(10)).await;
        assert!(drain(&mut h.rx).is_empty());

        let _ = h.source.set_active("dev1", png(100, 50, [4, 5, 6]));
        time::sleep(Duration::from_secs(5)).await;
        // Encoding runs on a blocking thread; wait for the NEW frame
        let msg = h.rx.recv().await;
        assert_eq!(msg, Some(new_frame()));

        cancel.cancel();
        handle.await.unwrap();
    }
}
