//! Row partitioning under a per-message byte budget.

use statustag_core::protocol::{COLOR_BYTES, PIXELS_OVERHEAD_BYTES};

/// Rows of a `width`-wide band that fit one framed PIXELS message.
///
/// Never below one, even when a single row exceeds the budget.
pub fn rows_per_batch(budget: usize, width: u16) -> u16 {
    let row_bytes = usize::from(width.max(1)) * COLOR_BYTES;
    let rows = budget.saturating_sub(PIXELS_OVERHEAD_BYTES) / row_bytes;
    rows.clamp(1, usize::from(u16::MAX)) as u16
}

/// `(start_row, rows)` pairs covering `0..height` top to bottom.
pub fn row_bands(height: u16, per_batch: u16) -> impl Iterator<Item = (u16, u16)> {
    let per_batch = per_batch.max(1);
    (0..height)
        .step_by(usize::from(per_batch))
        .map(move |start| (start, per_batch.min(height - start)))
}
