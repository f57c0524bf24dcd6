//! Source images as handed over by the image store.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Opaque version marker for the active image of a device.
///
/// Two polls that return equal identities are treated as "no change".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageIdentity(String);

impl ImageIdentity {
    /// Wrap an identity string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ImageIdentity {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ImageIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Container class of a source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Still image (PNG, JPEG, ...), decoded to RGBA.
    Raster,
    /// Animated GIF.
    Animated,
}

impl ImageFormat {
    /// Classify encoded bytes by their magic header.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Self::Animated
        } else {
            Self::Raster
        }
    }

    /// Stable lowercase name, used for storage and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raster => "raster",
            Self::Animated => "animated",
        }
    }

    /// Inverse of [`ImageFormat::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "raster" => Some(Self::Raster),
            "animated" => Some(Self::Animated),
            _ => None,
        }
    }
}

/// The active image of a device: identity, encoded bytes, format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceImage {
    /// Version marker.
    pub identity: ImageIdentity,
    /// Encoded container bytes.
    pub bytes: Bytes,
    /// Format tag.
    pub format: ImageFormat,
}

impl SourceImage {
    /// Build a source image, sniffing the format from the bytes.
    pub fn sniffed(identity: impl Into<ImageIdentity>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            identity: identity.into(),
            format: ImageFormat::sniff(&bytes),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_gif_versions() {
        assert_eq!(ImageFormat::sniff(b"GIF89a\x01\x00"), ImageFormat::Animated);
        assert_eq!(ImageFormat::sniff(b"GIF87a\x01\x00"), ImageFormat::Animated);
    }

    #[test]
    fn sniff_other_is_raster() {
        assert_eq!(ImageFormat::sniff(b"\x89PNG\r\n\x1a\n"), ImageFormat::Raster);
        assert_eq!(ImageFormat::sniff(b""), ImageFormat::Raster);
        assert_eq!(ImageFormat::sniff(b"GIF8"), ImageFormat::Raster);
    }

    #[test]
    fn format_names_roundtrip() {
        for f in [ImageFormat::Raster, ImageFormat::Animated] {
            assert_eq!(ImageFormat::parse(f.as_str()), Some(f));
        }
        assert_eq!(ImageFormat::parse("jpeg"), None);
    }

    #[test]
    fn identity_from_row_id() {
        assert_eq!(ImageIdentity::from(42).as_str(), "42");
    }

    #[test]
    fn sniffed_source_image() {
        let img = SourceImage::sniffed("A1", b"GIF89a....".to_vec());
        assert_eq!(img.format, ImageFormat::Animated);
        assert_eq!(img.identity.as_str(), "A1");
    }
}
