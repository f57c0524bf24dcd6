//! # statustag-imaging
//!
//! Turns a source image into the ordered patches a display pulls.
//!
//! - [`geometry`]: cover-fit transform
//! - [`color`]: RGB565 quantization with the transparency sentinel
//! - [`raster`]: still images as full-width PIXELS bands
//! - [`animation`] + [`gif_patches`]: animated GIFs as DELAY + PIXELS per frame
//! - [`passthrough`]: animated GIFs as a resized container in RAW_BYTES chunks

#![deny(unsafe_code)]

pub mod animation;
pub mod bands;
pub mod color;
pub mod error;
pub mod geometry;
pub mod gif_patches;
pub mod passthrough;
pub mod raster;

pub use error::ImagingError;
pub use geometry::CoverFit;

use statustag_core::{AnimatedStrategy, DisplayTarget, ImageFormat, PatchList, SourceImage};
use tracing::{debug, warn};

/// Highest number of patches a 16-bit pull sequence can address.
pub const ADDRESSABLE_PATCHES: usize = u16::MAX as usize + 1;

/// Build the patch list for `image` on `target`.
///
/// CPU-bound; callers on an async runtime should run it on a blocking thread.
pub fn build_patch_list(
    image: &SourceImage,
    target: &DisplayTarget,
    strategy: AnimatedStrategy,
) -> Result<PatchList, ImagingError> {
    let budget = target.buffer_size;
    let patches = match (image.format, strategy) {
        (ImageFormat::Raster, _) => raster::build(&image.bytes, target.width, target.height, budget)?,
        (ImageFormat::Animated, AnimatedStrategy::Frames) => {
            let fitted = animation::Animation::decode(&image.bytes)?.cover_fit(target.width, target.height)?;
            gif_patches::encode(&fitted, budget)?
        }
        (ImageFormat::Animated, AnimatedStrategy::Passthrough) => {
            let fitted = animation::Animation::decode(&image.bytes)?.cover_fit(target.width, target.height)?;
            passthrough::build(&fitted, budget)?
        }
    };

    if patches.len() > ADDRESSABLE_PATCHES {
        warn!(
            device_id = %target.device_id,
            identity = %image.identity,
            patches = patches.len(),
            "patch list exceeds the pull sequence space; trailing patches are unreachable"
        );
    }
    debug!(
        device_id = %target.device_id,
        identity = %image.identity,
        format = image.format.as_str(),
        patches = patches.len(),
        "patch list built"
    );

    Ok(PatchList::new(
        image.identity.clone(),
        target.width,
        target.height,
        patches,
    ))
}
