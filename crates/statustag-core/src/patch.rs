//! Display patches and the immutable list a device pulls from.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::image::ImageIdentity;

/// A rectangular band of quantized pixels.
///
/// `colors` is row-major, `width * rows` entries, each already in wire order
/// (byte-swapped RGB565, or the `0xFFFE` transparency sentinel).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBand {
    /// Left edge on the display.
    pub origin_x: u16,
    /// Top edge on the display.
    pub origin_y: u16,
    /// Band width in pixels.
    pub width: u16,
    /// Number of rows in the band.
    pub rows: u16,
    /// Quantized colors.
    pub colors: Vec<u16>,
}

/// One addressable unit of display data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Patch {
    /// Pixel band to draw at an origin.
    Pixels(PixelBand),
    /// Hold the current frame for `duration_ms` before drawing the next.
    Delay {
        /// Frame duration in milliseconds.
        duration_ms: u16,
    },
    /// Opaque fragment of a pre-encoded animated container.
    RawBytes(Bytes),
}

/// Discriminant of a [`Patch`], used for logging and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatchKind {
    /// [`Patch::Pixels`]
    Pixels,
    /// [`Patch::Delay`]
    Delay,
    /// [`Patch::RawBytes`]
    RawBytes,
}

impl PatchKind {
    /// Stable snake-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pixels => "pixels",
            Self::Delay => "delay",
            Self::RawBytes => "raw_bytes",
        }
    }
}

impl Patch {
    /// Kind of this patch.
    pub fn kind(&self) -> PatchKind {
        match self {
            Self::Pixels(_) => PatchKind::Pixels,
            Self::Delay { .. } => PatchKind::Delay,
            Self::RawBytes(_) => PatchKind::RawBytes,
        }
    }
}

/// Which encoder animated sources go through. One choice per server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimatedStrategy {
    /// Decode frames and emit DELAY + PIXELS patches.
    #[default]
    Frames,
    /// Resize the container and stream its raw bytes.
    Passthrough,
}

impl AnimatedStrategy {
    /// Parse the lowercase config name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "frames" => Some(Self::Frames),
            "passthrough" => Some(Self::Passthrough),
            _ => None,
        }
    }
}

/// Ordered patches built for one (image identity, display) pair.
///
/// Immutable once built; a changed image produces a fresh list.
#[derive(Debug, PartialEq, Eq)]
pub struct PatchList {
    identity: ImageIdentity,
    width: u16,
    height: u16,
    patches: Vec<Patch>,
}

impl PatchList {
    /// Wrap built patches.
    pub fn new(identity: ImageIdentity, width: u16, height: u16, patches: Vec<Patch>) -> Self {
        Self {
            identity,
            width,
            height,
            patches,
        }
    }

    /// Convenience for sharing between the registry and in-flight pulls.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Identity of the image these patches were built from.
    pub fn identity(&self) -> &ImageIdentity {
        &self.identity
    }

    /// Display dimensions the list was fitted to.
    pub fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Patch at a pull sequence number, `None` past the end.
    pub fn get(&self, seq: usize) -> Option<&Patch> {
        self.patches.get(seq)
    }

    /// Number of patches.
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// True when the list has no patches.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Patches in pull order.
    pub fn iter(&self) -> std::slice::Iter<'_, Patch> {
        self.patches.iter()
    }

    /// Number of patches of one kind.
    pub fn count_of(&self, kind: PatchKind) -> usize {
        self.patches.iter().filter(|p| p.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(y: u16) -> Patch {
        Patch::Pixels(PixelBand {
            origin_x: 0,
            origin_y: y,
            width: 1,
            rows: 1,
            colors: vec![0],
        })
    }

    #[test]
    fn get_in_and_out_of_range() {
        let list = PatchList::new("A1".into(), 1, 2, vec![band(0), band(1)]);
        assert_eq!(list.len(), 2);
        assert!(list.get(0).is_some());
        assert!(list.get(1).is_some());
        assert!(list.get(2).is_none());
    }

    #[test]
    fn counts_by_kind() {
        let list = PatchList::new(
            "A1".into(),
            1,
            1,
            vec![Patch::Delay { duration_ms: 100 }, band(0), band(0)],
        );
        assert_eq!(list.count_of(PatchKind::Delay), 1);
        assert_eq!(list.count_of(PatchKind::Pixels), 2);
        assert_eq!(list.count_of(PatchKind::RawBytes), 0);
    }

    #[test]
    fn strategy_parse() {
        assert_eq!(AnimatedStrategy::parse("frames"), Some(AnimatedStrategy::Frames));
        assert_eq!(
            AnimatedStrategy::parse("Passthrough"),
            Some(AnimatedStrategy::Passthrough)
        );
        assert_eq!(AnimatedStrategy::parse("gif"), None);
        assert_eq!(AnimatedStrategy::default(), AnimatedStrategy::Frames);
    }

    #[test]
    fn strategy_serde_lowercase() {
        let json = serde_json::to_string(&AnimatedStrategy::Passthrough).unwrap();
        assert_eq!(json, "\"passthrough\"");
    }
}
