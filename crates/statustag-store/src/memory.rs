use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use statustag_core::{DeviceId, ImageIdentity, ImageSource, SourceError, SourceImage};

/// In-process [`ImageSource`] for tests and `serve --memory`.
///
/// Each `set_active` mints a fresh identity, so re-activating identical bytes
/// still reads as a change.
#[derive(Default)]
pub struct MemoryImageSource {
    active: RwLock<HashMap<DeviceId, SourceImage>>,
    geometry: RwLock<HashMap<DeviceId, (u16, u16)>>,
    next_identity: AtomicI64,
    failing: AtomicBool,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `bytes` for a device, returning the minted identity.
    pub fn set_active(&self, device: impl Into<DeviceId>, bytes: impl Into<Bytes>) -> ImageIdentity {
        let identity = ImageIdentity::from(self.next_identity.fetch_add(1, Ordering::Relaxed) + 1);
        let image = SourceImage::sniffed(identity.clone(), bytes);
        let _ = self.active.write().insert(device.into(), image);
        identity
    }

    /// Activate an image with a caller-chosen identity.
    pub fn set_image(&self, device: impl Into<DeviceId>, image: SourceImage) {
        let _ = self.active.write().insert(device.into(), image);
    }

    pub fn clear_active(&self, device: &DeviceId) {
        let _ = self.active.write().remove(device);
    }

    /// Geometry last registered by a device.
    pub fn geometry(&self, device: &DeviceId) -> Option<(u16, u16)> {
        self.geometry.read().get(device).copied()
    }

    /// Make every lookup fail with a backend error until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(SourceError::Backend("memory source set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    async fn active_image(&self, device: &DeviceId) -> Result<Option<SourceImage>, SourceError> {
        self.check()?;
        Ok(self.active.read().get(device).cloned())
    }

    async fn register_device(&self, device: &DeviceId, width: u16, height: u16) -> Result<(), SourceError> {
        self.check()?;
        let _ = self.geometry.write().insert(device.clone(), (width, height));
        Ok(())
    }
}
