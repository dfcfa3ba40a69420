//! Borrowed BGR image views and the derived grayscale/gradient maps.
//!
//! `BgrImage` is a zero-copy view over a caller-owned interleaved 3-channel
//! byte buffer, row-major, channel order (B, G, R). The matcher derives a
//! grayscale map and per-pixel Sobel gradients from it once per match.

use crate::geometry::Gradient;
use crate::util::{PmsError, PmsResult};

/// Borrowed interleaved BGR image.
#[derive(Copy, Clone)]
pub struct BgrImage<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
}

impl<'a> BgrImage<'a> {
    /// Creates a view over `width * height * 3` contiguous bytes.
    pub fn from_slice(data: &'a [u8], width: usize, height: usize) -> PmsResult<Self> {
        if width == 0 || height == 0 {
            return Err(PmsError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or(PmsError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(PmsError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The backing byte slice.
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// The `[b, g, r]` sample at `(x, y)`. Callers keep coordinates in
    /// bounds.
    #[inline]
    pub(crate) fn bgr(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}

/// Converts a BGR image to grayscale in place with the fixed luma weights
/// `0.299 R + 0.587 G + 0.114 B`. `out` holds one byte per pixel.
pub(crate) fn gray_image(img: &BgrImage<'_>, out: &mut [u8]) {
    for y in 0..img.height() {
        for x in 0..img.width() {
            let [b, g, r] = img.bgr(x, y);
            let luma = f64::from(r) * 0.299 + f64::from(g) * 0.587 + f64::from(b) * 0.114;
            out[y * img.width() + x] = luma as u8;
        }
    }
}

/// 3x3 Sobel gradients scaled by 1/8, with a one-pixel border left at zero.
pub(crate) fn sobel_gradients(gray: &[u8], width: usize, height: usize, out: &mut [Gradient]) {
    out[..width * height].fill(Gradient::default());
    if width < 3 || height < 3 {
        return;
    }
    let at = |x: usize, y: usize| i32::from(gray[y * width + x]);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = (-at(x - 1, y - 1) + at(x + 1, y - 1))
                + (-2 * at(x - 1, y) + 2 * at(x + 1, y))
                + (-at(x - 1, y + 1) + at(x + 1, y + 1));
            let gy = (-at(x - 1, y - 1) - 2 * at(x, y - 1) - at(x + 1, y - 1))
                + (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1));
            out[y * width + x] = Gradient::new((gx / 8) as i16, (gy / 8) as i16);
        }
    }
}
