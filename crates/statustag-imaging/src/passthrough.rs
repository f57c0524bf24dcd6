//! Animated sources as a resized GIF streamed in RAW_BYTES chunks.

use std::borrow::Cow;

use bytes::Bytes;
use gif::Encoder;
use statustag_core::Patch;
use statustag_core::protocol::TAG_BYTES;

use crate::animation::Animation;
use crate::error::ImagingError;

/// Re-encode a fitted animation as a GIF container.
///
/// Frames with nothing visible are dropped and their delay folded into the
/// previous frame, or into the first visible frame when none precedes them.
pub fn encode_container(anim: &Animation) -> Result<Vec<u8>, ImagingError> {
    let global = anim.global_palette.as_deref().unwrap_or(&[]);
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, anim.width, anim.height, global)?;
        encoder.set_repeat(anim.repeat)?;

        let mut pending: Option<gif::Frame<'_>> = None;
        let mut carried: u16 = 0;
        for (idx, frame) in anim.frames.iter().enumerate() {
            if frame.is_empty() {
                match pending.as_mut() {
                    Some(prev) => prev.delay = prev.delay.saturating_add(frame.delay),
                    None => carried = carried.saturating_add(frame.delay),
                }
                continue;
            }
            if frame.palette.is_none() && anim.global_palette.is_none() {
                return Err(ImagingError::MissingPalette { frame: idx });
            }
            if let Some(prev) = pending.take() {
                encoder.write_frame(&prev)?;
            }
            pending = Some(gif::Frame {
                left: frame.left,
                top: frame.top,
                width: frame.width,
                height: frame.height,
                delay: frame.delay.saturating_add(std::mem::take(&mut carried)),
                dispose: frame.dispose,
                transparent: frame.transparent,
                palette: frame.palette.clone(),
                buffer: Cow::Borrowed(&frame.indices),
                ..gif::Frame::default()
            });
        }
        if let Some(last) = pending {
            encoder.write_frame(&last)?;
        }
    }
    Ok(out)
}

/// Split a byte stream into RAW_BYTES patches that frame within `budget`.
pub fn chunk(container: &[u8], budget: usize) -> Vec<Patch> {
    let size = budget.saturating_sub(TAG_BYTES).max(1);
    container
        .chunks(size)
        .map(|piece| Patch::RawBytes(Bytes::copy_from_slice(piece)))
        .collect()
}

/// Fitted container, chunked.
pub fn build(anim: &Animation, budget: usize) -> Result<Vec<Patch>, ImagingError> {
    Ok(chunk(&encode_container(anim)?, budget))
}
