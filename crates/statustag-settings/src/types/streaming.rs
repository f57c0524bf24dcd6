//! Patch encoding settings.

use serde::{Deserialize, Serialize};
use statustag_core::{AnimatedStrategy, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FILE_SIZE};

/// Defaults applied to devices and the encoder pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamingSettings {
    /// Patch budget when a device omits `bufferSize`.
    pub default_buffer_size: usize,
    /// Source size limit when a device omits `maxFileSize`; also the store's insert limit.
    pub default_max_file_size: u64,
    /// Encoder used for every animated source.
    pub animated_strategy: AnimatedStrategy,
    /// Patch lists built concurrently.
    pub encode_workers: usize,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            default_buffer_size: DEFAULT_BUFFER_SIZE,
            default_max_file_size: DEFAULT_MAX_FILE_SIZE,
            animated_strategy: AnimatedStrategy::Frames,
            encode_workers: 4,
        }
    }
}
