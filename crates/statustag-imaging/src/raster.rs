//! Still images: decode, cover-fit, and split into PIXELS bands.

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use statustag_core::{Patch, PixelBand};

use crate::bands::{row_bands, rows_per_batch};
use crate::color::quantize;
use crate::error::ImagingError;
use crate::geometry::CoverFit;

/// Decode any supported raster format and cover-fit it to `width x height`.
pub fn fit(bytes: &[u8], width: u16, height: u16) -> Result<RgbaImage, ImagingError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(cover(&decoded, width, height)?.to_rgba8())
}

fn cover(img: &DynamicImage, width: u16, height: u16) -> Result<DynamicImage, ImagingError> {
    let fit = CoverFit::compute(img.width(), img.height(), width.into(), height.into())?;
    let (x, y, w, h) = fit.source_window();
    let window = img.crop_imm(x, y, w, h);
    if fit.is_identity() || (w, h) == (fit.width, fit.height) {
        return Ok(window);
    }
    // Resample only the covered window; the scaled image can be huge.
    Ok(window.resize_exact(fit.width, fit.height, FilterType::Triangle))
}

/// Split a fitted image into full-width bands, top to bottom.
///
/// Alpha is ignored.
pub fn encode(img: &RgbaImage, budget: usize) -> Vec<Patch> {
    let width = img.width() as u16;
    let height = img.height() as u16;
    let per_batch = rows_per_batch(budget, width);

    row_bands(height, per_batch)
        .map(|(start, rows)| {
            let mut colors = Vec::with_capacity(usize::from(width) * usize::from(rows));
            for y in u32::from(start)..u32::from(start + rows) {
                for x in 0..img.width() {
                    let [r, g, b, _] = img.get_pixel(x, y).0;
                    colors.push(quantize(r, g, b));
                }
            }
            Patch::Pixels(PixelBand {
                origin_x: 0,
                origin_y: start,
                width,
                rows,
                colors,
            })
        })
        .collect()
}

/// Decode, fit, and band a raster image.
pub fn build(bytes: &[u8], width: u16, height: u16, budget: usize) -> Result<Vec<Patch>, ImagingError> {
    let fitted = fit(bytes, width, height)?;
    Ok(encode(&fitted, budget))
}
