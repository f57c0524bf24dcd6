//! 24-bit RGB to byte-swapped RGB565 with a reserved transparency value.

/// Wire value marking a pixel the receiver should leave untouched.
pub const TRANSPARENT: u16 = 0xFFFE;

/// Substitute for a real color that would collide with [`TRANSPARENT`].
pub const TRANSPARENT_COLLISION: u16 = 0xFFFF;

/// Quantize an RGB triple to its wire color.
///
/// Packs 5/6/5 bits and swaps the two bytes. A result equal to
/// [`TRANSPARENT`] is coerced to [`TRANSPARENT_COLLISION`] (lossy on purpose).
pub fn quantize(r: u8, g: u8, b: u8) -> u16 {
    let packed = (u16::from(r & 0xF8) << 8) | (u16::from(g & 0xFC) << 3) | u16::from(b >> 3);
    match packed.swap_bytes() {
        TRANSPARENT => TRANSPARENT_COLLISION,
        wire => wire,
    }
}

/// Expand a wire color back to 8-bit channels, replicating high bits.
pub fn to_rgb888(wire: u16) -> (u8, u8, u8) {
    let packed = wire.swap_bytes();
    let r5 = (packed >> 11) as u8;
    let g6 = ((packed >> 5) & 0x3F) as u8;
    let b5 = (packed & 0x1F) as u8;
    ((r5 << 3) | (r5 >> 2), (g6 << 2) | (g6 >> 4), (b5 << 3) | (b5 >> 2))
}

/// Quantize a packed `RGBRGB...` color table.
pub fn quantize_palette(table: &[u8]) -> Vec<u16> {
    table
        .chunks_exact(3)
        .map(|rgb| quantize(rgb[0], rgb[1], rgb[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: u8, b: u8) -> bool {
        a.abs_diff(b) <= 1
    }

    #[test]
    fn primaries_round_trip() {
        for rgb in [(255, 0, 0), (0, 255, 0), (0, 0, 255)] {
            let (r, g, b) = to_rgb888(quantize(rgb.0, rgb.1, rgb.2));
            assert!(close(r, rgb.0) && close(g, rgb.1) && close(b, rgb.2), "{rgb:?}");
        }
    }

    #[test]
    fn bytes_are_swapped() {
        // Pure red packs to 0xF800.
        assert_eq!(quantize(255, 0, 0), 0x00F8);
        assert_eq!(quantize(0, 0, 255), 0x1F00);
        assert_eq!(quantize(0, 0, 0), 0x0000);
    }

    #[test]
    fn sentinel_collision_is_coerced() {
        // Packs to 0xFEFF, which swaps to the sentinel.
        assert_eq!(quantize(255, 220, 255), TRANSPARENT_COLLISION);
        assert_eq!(quantize(248, 220, 248), TRANSPARENT_COLLISION);
        assert_eq!(quantize(255, 255, 255), 0xFFFF);
    }

    #[test]
    fn no_color_produces_sentinel() {
        for r in (0..=255u8).step_by(8) {
            for g in (0..=255u8).step_by(4) {
                for b in (0..=255u8).step_by(8) {
                    assert_ne!(quantize(r, g, b), TRANSPARENT);
                }
            }
        }
    }

    #[test]
    fn palette_quantization() {
        let table = [255, 0, 0, 0, 0, 255, 7];
        assert_eq!(quantize_palette(&table), vec![0x00F8, 0x1F00]);
    }
}
