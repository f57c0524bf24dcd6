//! Contract the streaming engine consumes to find each device's image.

use async_trait::async_trait;

use crate::ids::DeviceId;
use crate::image::SourceImage;

/// Failure reported by an [`ImageSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("image source backend error: {0}")]
    Backend(String),
    #[error("image too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),
}

/// Maps a device to its currently active image.
///
/// Identities must change whenever the active image changes; the engine
/// compares them to decide whether to rebuild.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Current active image, or `None` when nothing is assigned.
    async fn active_image(&self, device: &DeviceId) -> Result<Option<SourceImage>, SourceError>;

    /// Record the screen geometry a device reported at connect.
    async fn register_device(
        &self,
        device: &DeviceId,
        width: u16,
        height: u16,
    ) -> Result<(), SourceError>;
}
