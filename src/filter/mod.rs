//! Median and weighted-median disparity filters.

use crate::image::BgrImage;

/// Plain median filter over a square window, edge pixels using the clamped
/// window.
pub fn median_filter(src: &[f32], dst: &mut [f32], width: usize, height: usize, window: usize) {
    let radius = window as i32 / 2;
    let mut samples: Vec<f32> = Vec::with_capacity(window * window);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            samples.clear();
            for r in -radius..=radius {
                for c in -radius..=radius {
                    let row = y + r;
                    let col = x + c;
                    if row >= 0 && row < height as i32 && col >= 0 && col < width as i32 {
                        samples.push(src[(row * width as i32 + col) as usize]);
                    }
                }
            }
            samples.sort_by(f32::total_cmp);
            if !samples.is_empty() {
                dst[(y * width as i32 + x) as usize] = samples[samples.len() / 2];
            }
        }
    }
}

/// Weighted median filter applied only at the listed pixels.
///
/// Finite disparities in the window are weighted by the bilateral kernel
/// `exp(-color_distance / gamma)` against the center pixel; the selected
/// value is the first, in disparity order, whose cumulative weight reaches
/// half the total. Smooths extrapolation artifacts while respecting color
/// edges.
pub fn weighted_median_filter(
    img: &BgrImage<'_>,
    window: usize,
    gamma: f32,
    pixels: &[(i32, i32)],
    disparity: &mut [f32],
) {
    let width = img.width() as i32;
    let height = img.height() as i32;
    let radius = window as i32 / 2;

    let mut weighted: Vec<(f32, f32)> = Vec::with_capacity(window * window);
    for &(x, y) in pixels {
        weighted.clear();
        let col_p = img.bgr(x as usize, y as usize);
        let mut total_w = 0.0f32;
        for r in -radius..=radius {
            for c in -radius..=radius {
                let yr = y + r;
                let xc = x + c;
                if yr < 0 || yr >= height || xc < 0 || xc >= width {
                    continue;
                }
                let d = disparity[(yr * width + xc) as usize];
                if !d.is_finite() {
                    continue;
                }
                let col_q = img.bgr(xc as usize, yr as usize);
                let dc = u32::from(col_p[0].abs_diff(col_q[0]))
                    + u32::from(col_p[1].abs_diff(col_q[1]))
                    + u32::from(col_p[2].abs_diff(col_q[2]));
                let w = (-(dc as f32) / gamma).exp();
                total_w += w;
                weighted.push((d, w));
            }
        }

        weighted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let half_w = total_w / 2.0;
        let mut acc = 0.0f32;
        for &(d, w) in &weighted {
            acc += w;
            if acc >= half_w {
                disparity[(y * width + x) as usize] = d;
                break;
            }
        }
    }
}
