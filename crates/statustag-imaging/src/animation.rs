//! Indexed GIF frames: decoding and cover-fitting on the index plane.
//!
//! Frames stay as palette indices so per-frame color tables, the
//! transparent index and disposal survive the fit unchanged.

use std::io::Cursor;

use gif::{ColorOutput, DecodeOptions, DisposalMethod, Repeat};

use crate::error::ImagingError;
use crate::geometry::CoverFit;

/// One frame as palette indices over a sub-rectangle of the canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Delay in GIF centiseconds.
    pub delay: u16,
    pub dispose: DisposalMethod,
    pub transparent: Option<u8>,
    /// Local color table; `None` inherits the global one.
    pub palette: Option<Vec<u8>>,
    pub indices: Vec<u8>,
}

impl IndexedFrame {
    /// Delay in milliseconds, saturating.
    pub fn delay_ms(&self) -> u16 {
        self.delay.saturating_mul(10)
    }

    /// True when nothing of the frame is visible.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A decoded animation.
#[derive(Clone, Debug)]
pub struct Animation {
    pub width: u16,
    pub height: u16,
    pub global_palette: Option<Vec<u8>>,
    pub repeat: Repeat,
    pub frames: Vec<IndexedFrame>,
}

impl Animation {
    pub fn decode(bytes: &[u8]) -> Result<Self, ImagingError> {
        let mut options = DecodeOptions::new();
        options.set_color_output(ColorOutput::Indexed);
        let mut decoder = options.read_info(Cursor::new(bytes))?;

        let width = decoder.width();
        let height = decoder.height();
        let global_palette = decoder.global_palette().map(<[u8]>::to_vec);

        let mut frames = Vec::new();
        while let Some(frame) = decoder.read_next_frame()? {
            let expected = usize::from(frame.width) * usize::from(frame.height);
            if frame.buffer.len() < expected {
                return Err(ImagingError::FrameBuffer {
                    frame: frames.len(),
                    expected,
                    actual: frame.buffer.len(),
                });
            }
            frames.push(IndexedFrame {
                left: frame.left,
                top: frame.top,
                width: frame.width,
                height: frame.height,
                delay: frame.delay,
                dispose: frame.dispose,
                transparent: frame.transparent,
                palette: frame.palette.clone(),
                indices: frame.buffer[..expected].to_vec(),
            });
        }

        Ok(Self {
            width,
            height,
            global_palette,
            repeat: decoder.repeat(),
            frames,
        })
    }

    /// Cover-fit every frame onto a `width x height` canvas.
    ///
    /// Frames left entirely outside the crop come back empty but keep their
    /// delay, so timing is preserved.
    pub fn cover_fit(&self, width: u16, height: u16) -> Result<Self, ImagingError> {
        let fit = CoverFit::compute(
            self.width.into(),
            self.height.into(),
            width.into(),
            height.into(),
        )?;
        Ok(Self {
            width,
            height,
            global_palette: self.global_palette.clone(),
            repeat: self.repeat,
            frames: self.frames.iter().map(|f| fit_frame(f, &fit)).collect(),
        })
    }
}

fn fit_frame(frame: &IndexedFrame, fit: &CoverFit) -> IndexedFrame {
    let cols = covered(fit.width, |x| fit.source_x(x), frame.left, frame.width);
    let rows = covered(fit.height, |y| fit.source_y(y), frame.top, frame.height);

    let mut fitted = IndexedFrame {
        left: 0,
        top: 0,
        width: 0,
        height: 0,
        delay: frame.delay,
        dispose: frame.dispose,
        transparent: frame.transparent,
        palette: frame.palette.clone(),
        indices: Vec::new(),
    };
    let (Some((x0, x1)), Some((y0, y1))) = (cols, rows) else {
        return fitted;
    };

    let stride = usize::from(frame.width);
    let mut indices = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
    for y in y0..y1 {
        let sy = (fit.source_y(y) - u32::from(frame.top)) as usize;
        for x in x0..x1 {
            let sx = (fit.source_x(x) - u32::from(frame.left)) as usize;
            indices.push(frame.indices[sy * stride + sx]);
        }
    }

    fitted.left = x0 as u16;
    fitted.top = y0 as u16;
    fitted.width = (x1 - x0) as u16;
    fitted.height = (y1 - y0) as u16;
    fitted.indices = indices;
    fitted
}

/// Display range `[start, end)` whose samples land in `[origin, origin + len)`.
///
/// Sampling is monotonic, so the covered positions are contiguous.
fn covered(extent: u32, sample: impl Fn(u32) -> u32, origin: u16, len: u16) -> Option<(u32, u32)> {
    let lo = u32::from(origin);
    let hi = lo + u32::from(len);
    let mut range: Option<(u32, u32)> = None;
    for pos in 0..extent {
        let src = sample(pos);
        if src >= lo && src < hi {
            range = Some(match range {
                Some((start, _)) => (start, pos + 1),
                None => (pos, pos + 1),
            });
        } else if src >= hi {
            break;
        }
    }
    range
}
