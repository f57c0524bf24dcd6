//! Per-device session registry.
//!
//! Holds the last-seen image identity and current patch list for every device
//! with a live session. Slots are created on connect and removed on close; a
//! newer connection for the same device supersedes the older one, and the
//! generation check keeps the older session's cleanup from removing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use statustag_core::{ConnectionId, DeviceId, ImageIdentity, PatchList};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Image state cached for one device.
#[derive(Debug, Default)]
pub struct DeviceCache {
    /// Identity the current patch list was built from.
    pub last_seen: Option<ImageIdentity>,
    /// Patches served to pull requests.
    pub patches: Option<Arc<PatchList>>,
}

/// One device's registry entry.
#[derive(Debug)]
pub struct DeviceSlot {
    device_id: DeviceId,
    connection_id: ConnectionId,
    generation: u64,
    cancel: CancellationToken,
    cache: Mutex<DeviceCache>,
}

impl DeviceSlot {
    /// Device this slot belongs to.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Connection that owns the slot.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Monotonic claim number, unique per registry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancelled when the session is superseded or the server shuts down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether a newer connection or shutdown has cancelled this slot.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `f` with the cache locked. Keep `f` short; it blocks other
    /// work on this device only.
    pub fn with_cache<T>(&self, f: impl FnOnce(&mut DeviceCache) -> T) -> T {
        f(&mut self.cache.lock())
    }

    /// Identity of the active patch list, if any.
    pub fn last_seen(&self) -> Option<ImageIdentity> {
        self.cache.lock().last_seen.clone()
    }

    /// Current patch list, if any.
    pub fn patch_list(&self) -> Option<Arc<PatchList>> {
        self.cache.lock().patches.clone()
    }

    /// Drop the cached identity and patch list.
    pub fn clear(&self) {
        *self.cache.lock() = DeviceCache::default();
    }
}

/// Device id → live session slot.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: DashMap<DeviceId, Arc<DeviceSlot>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `device`, superseding any live one.
    ///
    /// The returned slot's token is a child of `parent`; the superseded
    /// slot's token is cancelled.
    pub fn claim(
        &self,
        device: DeviceId,
        connection: ConnectionId,
        parent: &CancellationToken,
    ) -> Arc<DeviceSlot> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(DeviceSlot {
            device_id: device.clone(),
            connection_id: connection,
            generation,
            cancel: parent.child_token(),
            cache: Mutex::new(DeviceCache::default()),
        });

        if let Some(previous) = self.slots.insert(device, slot.clone()) {
            info!(
                device_id = %previous.device_id,
                superseded = %previous.connection_id,
                connection_id = %slot.connection_id,
                "device reconnected; superseding previous session"
            );
            previous.cancel.cancel();
        }
        slot
    }

    /// Remove `slot` if it is still the registered one. Returns whether it was.
    pub fn release(&self, slot: &DeviceSlot) -> bool {
        self.slots
            .remove_if(&slot.device_id, |_, current| current.generation == slot.generation)
            .is_some()
    }

    /// Live slot for `device`.
    pub fn get(&self, device: &DeviceId) -> Option<Arc<DeviceSlot>> {
        self.slots.get(device).map(|entry| entry.value().clone())
    }

    /// Whether `device` has a live session.
    pub fn contains(&self, device: &DeviceId) -> bool {
        self.slots.contains_key(device)
    }

    /// Last-seen identity for `device`.
    pub fn last_seen(&self, device: &DeviceId) -> Option<ImageIdentity> {
        self.get(device).and_then(|slot| slot.last_seen())
    }

    /// Current patch list for `device`.
    pub fn patch_list(&self, device: &DeviceId) -> Option<Arc<PatchList>> {
        self.get(device).and_then(|slot| slot.patch_list())
    }

    /// Number of devices with a live session.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no device is connected.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
