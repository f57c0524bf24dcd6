use statustag_core::{ImageIdentity, StreamError};

/// Failures while fitting or encoding a source image.
#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    #[error("invalid geometry: source {source_width}x{source_height}, target {target_width}x{target_height}")]
    InvalidGeometry {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
    },
    #[error("raster decode failed: {0}")]
    Raster(#[from] image::ImageError),
    #[error("gif decode failed: {0}")]
    GifDecode(#[from] gif::DecodingError),
    #[error("gif encode failed: {0}")]
    GifEncode(#[from] gif::EncodingError),
    #[error("frame {frame} has no color table")]
    MissingPalette { frame: usize },
    #[error("frame {frame} references color {index} outside a {entries}-entry table")]
    PaletteIndex {
        frame: usize,
        index: u8,
        entries: usize,
    },
    #[error("frame {frame} holds {actual} indices, expected {expected}")]
    FrameBuffer {
        frame: usize,
        expected: usize,
        actual: usize,
    },
}

impl ImagingError {
    /// Attach the identity of the image that failed.
    pub fn into_stream_error(self, identity: &ImageIdentity) -> StreamError {
        StreamError::DecodeFailure {
            identity: identity.clone(),
            reason: self.to_string(),
        }
    }
}
