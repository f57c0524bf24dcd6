//! Scale-to-fill then center-crop ("cover") geometry.

use crate::error::ImagingError;

/// Cover-fit transform from a source size onto a display.
///
/// The source is scaled uniformly to `scaled_*` so it covers the target on
/// both axes, then the `width x height` window at `(crop_x, crop_y)` is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverFit {
    pub source_width: u32,
    pub source_height: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub width: u32,
    pub height: u32,
}

impl CoverFit {
    pub fn compute(
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Self, ImagingError> {
        if source_width == 0 || source_height == 0 || target_width == 0 || target_height == 0 {
            return Err(ImagingError::InvalidGeometry {
                source_width,
                source_height,
                target_width,
                target_height,
            });
        }

        let scale = (f64::from(target_width) / f64::from(source_width))
            .max(f64::from(target_height) / f64::from(source_height));

        // Rounding may land one pixel short of the target; never letterbox.
        let scaled_width = scaled(source_width, scale).max(target_width);
        let scaled_height = scaled(source_height, scale).max(target_height);

        Ok(Self {
            source_width,
            source_height,
            scaled_width,
            scaled_height,
            crop_x: centered(scaled_width, target_width),
            crop_y: centered(scaled_height, target_height),
            width: target_width,
            height: target_height,
        })
    }

    /// True when no resampling is required.
    pub fn is_identity(&self) -> bool {
        self.scaled_width == self.source_width && self.scaled_height == self.source_height
    }

    /// The crop window mapped back onto the source, as `(x, y, width, height)`.
    ///
    /// Widened outward to whole source pixels and never empty, so cropping the
    /// source to it and resampling to `width x height` covers the same area
    /// as scaling first without materialising the scaled image.
    pub fn source_window(&self) -> (u32, u32, u32, u32) {
        let (x, w) = window(self.crop_x, self.width, self.source_width, self.scaled_width);
        let (y, h) = window(self.crop_y, self.height, self.source_height, self.scaled_height);
        (x, y, w, h)
    }

    /// Source column sampled for display column `x` (nearest neighbour).
    pub fn source_x(&self, x: u32) -> u32 {
        sample(x + self.crop_x, self.source_width, self.scaled_width)
    }

    /// Source row sampled for display row `y` (nearest neighbour).
    pub fn source_y(&self, y: u32) -> u32 {
        sample(y + self.crop_y, self.source_height, self.scaled_height)
    }
}

fn scaled(len: u32, scale: f64) -> u32 {
    (f64::from(len) * scale).round() as u32
}

fn centered(scaled: u32, target: u32) -> u32 {
    let slack = scaled - target;
    let origin = (f64::from(slack) / 2.0).round() as u32;
    origin.min(slack)
}

fn window(crop: u32, len: u32, source_len: u32, scaled_len: u32) -> (u32, u32) {
    let source = u64::from(source_len);
    let scaled = u64::from(scaled_len);
    let start = (u64::from(crop) * source / scaled).min(source - 1);
    let end = (u64::from(crop + len) * source).div_ceil(scaled).clamp(start + 1, source);
    (start as u32, (end - start) as u32)
}

fn sample(scaled_pos: u32, source_len: u32, scaled_len: u32) -> u32 {
    let pos = u64::from(scaled_pos) * u64::from(source_len) / u64::from(scaled_len);
    (pos as u32).min(source_len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn same_size_is_identity() {
        let fit = CoverFit::compute(100, 50, 100, 50).unwrap();
        assert!(fit.is_identity());
        assert_eq!((fit.crop_x, fit.crop_y), (0, 0));
    }

    #[test]
    fn wide_source_crops_horizontally() {
        let fit = CoverFit::compute(400, 100, 100, 100).unwrap();
        assert_eq!((fit.scaled_width, fit.scaled_height), (400, 100));
        assert_eq!((fit.crop_x, fit.crop_y), (150, 0));
    }

    #[test]
    fn tall_source_upscales_and_crops_vertically() {
        let fit = CoverFit::compute(10, 40, 20, 20).unwrap();
        assert_eq!((fit.scaled_width, fit.scaled_height), (20, 80));
        assert_eq!((fit.crop_x, fit.crop_y), (0, 30));
    }

    #[test]
    fn nearest_neighbour_sampling() {
        let fit = CoverFit::compute(10, 10, 20, 20).unwrap();
        assert_eq!(fit.source_x(0), 0);
        assert_eq!(fit.source_x(1), 0);
        assert_eq!(fit.source_x(19), 9);
        assert_eq!(fit.source_y(10), 5);
    }

    #[test]
    fn source_window_of_extreme_aspect() {
        let fit = CoverFit::compute(1, 4000, 320, 240).unwrap();
        assert_eq!(fit.scaled_height, 1_280_000);
        let (x, y, w, h) = fit.source_window();
        assert_eq!((x, w), (0, 1));
        assert_eq!((y, h), (1999, 2));
    }

    #[test]
    fn source_window_of_centered_crop() {
        let fit = CoverFit::compute(400, 100, 100, 100).unwrap();
        assert_eq!(fit.source_window(), (150, 0, 100, 100));
    }

    #[test]
    fn zero_dimension_rejected() {
        assert_matches!(
            CoverFit::compute(0, 10, 10, 10),
            Err(ImagingError::InvalidGeometry { .. })
        );
        assert_matches!(
            CoverFit::compute(10, 10, 10, 0),
            Err(ImagingError::InvalidGeometry { .. })
        );
    }

    proptest! {
        #[test]
        fn crop_is_exact_and_inside(
            sw in 1u32..2000, sh in 1u32..2000, tw in 1u32..700, th in 1u32..700,
        ) {
            let fit = CoverFit::compute(sw, sh, tw, th).unwrap();
            prop_assert_eq!(fit.width, tw);
            prop_assert_eq!(fit.height, th);
            prop_assert!(fit.crop_x + fit.width <= fit.scaled_width);
            prop_assert!(fit.crop_y + fit.height <= fit.scaled_height);
            // Cover: one axis is filled within rounding.
            prop_assert!(fit.scaled_width <= tw + 1 || fit.scaled_height <= th + 1);
        }

        #[test]
        fn source_window_stays_in_source(
            sw in 1u32..5000, sh in 1u32..5000, tw in 1u32..700, th in 1u32..700,
        ) {
            let fit = CoverFit::compute(sw, sh, tw, th).unwrap();
            let (x, y, w, h) = fit.source_window();
            prop_assert!(w >= 1 && h >= 1);
            prop_assert!(x + w <= sw);
            prop_assert!(y + h <= sh);
        }

        #[test]
        fn sampling_stays_in_source(
            sw in 1u32..500, sh in 1u32..500, tw in 1u32..300, th in 1u32..300,
        ) {
            let fit = CoverFit::compute(sw, sh, tw, th).unwrap();
            prop_assert!(fit.source_x(tw - 1) < sw);
            prop_assert!(fit.source_y(th - 1) < sh);
        }
    }
}
