//! Animated sources as DELAY + PIXELS patches, one group per frame.

use statustag_core::{Patch, PixelBand};

use crate::animation::{Animation, IndexedFrame};
use crate::bands::{row_bands, rows_per_batch};
use crate::color::{TRANSPARENT, quantize_palette};
use crate::error::ImagingError;

/// Encode a fitted animation.
///
/// Each frame contributes one DELAY patch followed by its PIXELS bands, with
/// origins offset by the frame's position on the canvas.
pub fn encode(anim: &Animation, budget: usize) -> Result<Vec<Patch>, ImagingError> {
    let global = anim.global_palette.as_deref().map(quantize_palette);
    let mut patches = Vec::new();

    for (idx, frame) in anim.frames.iter().enumerate() {
        patches.push(Patch::Delay {
            duration_ms: frame.delay_ms(),
        });
        if frame.is_empty() {
            continue;
        }

        let local = frame.palette.as_deref().map(quantize_palette);
        let table = local
            .as_deref()
            .or(global.as_deref())
            .ok_or(ImagingError::MissingPalette { frame: idx })?;
        let colors = resolve_colors(idx, frame, table)?;

        let width = usize::from(frame.width);
        for (start, rows) in row_bands(frame.height, rows_per_batch(budget, frame.width)) {
            let from = usize::from(start) * width;
            let to = from + usize::from(rows) * width;
            patches.push(Patch::Pixels(PixelBand {
                origin_x: frame.left,
                origin_y: frame.top + start,
                width: frame.width,
                rows,
                colors: colors[from..to].to_vec(),
            }));
        }
    }

    Ok(patches)
}

fn resolve_colors(idx: usize, frame: &IndexedFrame, table: &[u16]) -> Result<Vec<u16>, ImagingError> {
    frame
        .indices
        .iter()
        .map(|&index| {
            if frame.transparent == Some(index) {
                return Ok(TRANSPARENT);
            }
            table
                .get(usize::from(index))
                .copied()
                .ok_or(ImagingError::PaletteIndex {
                    frame: idx,
                    index,
                    entries: table.len(),
                })
        })
        .collect()
}
