//! Display geometry negotiated when a device connects.

use serde::{Deserialize, Serialize};

use crate::ids::DeviceId;

/// Patch payload budget used when the device does not send `bufferSize`.
pub const DEFAULT_BUFFER_SIZE: usize = 2500;

/// Advisory source size limit used when the device does not send `maxFileSize`.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2_000_000;

/// One device's display and transport limits.
///
/// Width and height are bounded by the 16-bit fields of the PIXELS header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTarget {
    /// Device presenting this display.
    pub device_id: DeviceId,
    /// Display width in pixels (> 0).
    pub width: u16,
    /// Display height in pixels (> 0).
    pub height: u16,
    /// Maximum framed message size in bytes.
    pub buffer_size: usize,
    /// Advisory maximum source image size. Enforced by the image store.
    pub max_file_size: u64,
}

impl DisplayTarget {
    /// Target with the default buffer and file size limits.
    pub fn new(device_id: impl Into<DeviceId>, width: u16, height: u16) -> Self {
        Self {
            device_id: device_id.into(),
            width,
            height,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Override the negotiated buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Override the advisory file size limit.
    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Total pixel count of the display.
    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}
