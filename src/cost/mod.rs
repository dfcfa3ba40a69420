//! Color+gradient matching cost, pixel-level and plane-aggregated.
//!
//! The pixel-level cost blends truncated color and gradient dissimilarity
//! between a pixel and its (possibly fractional) matched column in the other
//! view. The aggregated cost sums pixel costs over a square patch, each
//! weighted by a bilateral color-similarity kernel relative to the patch
//! center; there is no normalization by total weight, so similar-looking
//! nearby pixels dominate both signal and magnitude.

use crate::geometry::{DisparityPlane, Gradient};
use crate::image::BgrImage;
use crate::options::PmsOptions;
use crate::util::math::fast_exp;

/// Added instead of a similarity term when a plane's disparity leaves the
/// configured range: large enough to discourage such planes, finite so the
/// search stays comparable.
pub(crate) const COST_PUNISH: f32 = 120.0;

/// Evaluates matching cost of one view against its counterpart.
///
/// `img_p`/`grad_p` belong to the view being optimized, `img_q`/`grad_q` to
/// the view it matches into. The disparity range carries the view's sign
/// convention (left positive, right negated and swapped).
pub struct CostComputer<'a> {
    img_p: BgrImage<'a>,
    img_q: BgrImage<'a>,
    grad_p: &'a [Gradient],
    grad_q: &'a [Gradient],
    width: i32,
    height: i32,
    patch_size: i32,
    min_disp: f32,
    max_disp: f32,
    gamma: f32,
    alpha: f32,
    tau_col: f32,
    tau_grad: f32,
}

impl<'a> CostComputer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        img_p: BgrImage<'a>,
        img_q: BgrImage<'a>,
        grad_p: &'a [Gradient],
        grad_q: &'a [Gradient],
        min_disparity: i32,
        max_disparity: i32,
        options: &PmsOptions,
    ) -> Self {
        Self {
            img_p,
            img_q,
            grad_p,
            grad_q,
            width: img_p.width() as i32,
            height: img_p.height() as i32,
            patch_size: options.patch_size as i32,
            min_disp: min_disparity as f32,
            max_disp: max_disparity as f32,
            gamma: options.gamma,
            alpha: options.alpha,
            tau_col: options.tau_col,
            tau_grad: options.tau_grad,
        }
    }

    /// Cost of matching pixel `(x, y)` at disparity `d`.
    pub fn compute(&self, x: i32, y: i32, d: f32) -> f32 {
        let col_p = self.img_p.bgr(x as usize, y as usize);
        let grad_p = self.grad_p[(y * self.width + x) as usize];
        self.compute_with(col_p, grad_p, x, y, d)
    }

    /// Cost of matching pixel `(x, y)` at disparity `d`, with the pixel's own
    /// color and gradient already fetched.
    pub fn compute_with(&self, col_p: [u8; 3], grad_p: Gradient, x: i32, y: i32, d: f32) -> f32 {
        let xq = x as f32 - d;
        if xq < 0.0 || xq >= self.width as f32 {
            // Worst-case dissimilarity for a match that leaves the image.
            return (1.0 - self.alpha) * self.tau_col + self.alpha * self.tau_grad;
        }

        let col_q = interp_color(&self.img_q, xq, y);
        let dc = (f32::from(col_p[0]) - col_q[0]).abs()
            + (f32::from(col_p[1]) - col_q[1]).abs()
            + (f32::from(col_p[2]) - col_q[2]).abs();
        let dc = dc.min(self.tau_col);

        let grad_q = interp_gradient(self.grad_q, self.width, xq, y);
        let dg = (f32::from(grad_p.x) - grad_q.0).abs() + (f32::from(grad_p.y) - grad_q.1).abs();
        let dg = dg.min(self.tau_grad);

        (1.0 - self.alpha) * dc + self.alpha * dg
    }

    /// Aggregated cost of assigning `plane` to pixel `(x, y)`, summed over
    /// the bilateral-weighted patch.
    pub fn compute_aggregated(&self, x: i32, y: i32, plane: DisparityPlane) -> f32 {
        let half = self.patch_size / 2;
        let col_p = self.img_p.bgr(x as usize, y as usize);
        let mut cost = 0.0f32;
        for r in -half..=half {
            let yr = y + r;
            if yr < 0 || yr >= self.height {
                continue;
            }
            for c in -half..=half {
                let xc = x + c;
                if xc < 0 || xc >= self.width {
                    continue;
                }

                let d = plane.to_disparity(xc, yr);
                // Non-finite disparities (singular view transforms) take the
                // punishment branch as well.
                if !(self.min_disp..=self.max_disp).contains(&d) {
                    cost += COST_PUNISH;
                    continue;
                }

                let col_q = self.img_p.bgr(xc as usize, yr as usize);
                let dc = u32::from(col_p[0].abs_diff(col_q[0]))
                    + u32::from(col_p[1].abs_diff(col_q[1]))
                    + u32::from(col_p[2].abs_diff(col_q[2]));
                let w = fast_exp(f64::from(dc) * f64::from(-1.0 / self.gamma));

                let grad_q = self.grad_p[(yr * self.width + xc) as usize];
                cost += (w * f64::from(self.compute_with(col_q, grad_q, xc, yr, d))) as f32;
            }
        }
        cost
    }
}

/// Linear interpolation of a BGR sample along x; the right neighbor clamps
/// at the image edge.
fn interp_color(img: &BgrImage<'_>, x: f32, y: i32) -> [f32; 3] {
    let x1 = x as i32;
    let x2 = x1 + 1;
    let ofs = x - x1 as f32;
    let c1 = img.bgr(x1 as usize, y as usize);
    let c2 = if (x2 as usize) < img.width() {
        img.bgr(x2 as usize, y as usize)
    } else {
        c1
    };
    [
        (1.0 - ofs) * f32::from(c1[0]) + ofs * f32::from(c2[0]),
        (1.0 - ofs) * f32::from(c1[1]) + ofs * f32::from(c2[1]),
        (1.0 - ofs) * f32::from(c1[2]) + ofs * f32::from(c2[2]),
    ]
}

/// Linear interpolation of a gradient sample along x, clamped like
/// [`interp_color`].
fn interp_gradient(grad: &[Gradient], width: i32, x: f32, y: i32) -> (f32, f32) {
    let x1 = x as i32;
    let x2 = x1 + 1;
    let ofs = x - x1 as f32;
    let g1 = grad[(y * width + x1) as usize];
    let g2 = if x2 < width {
        grad[(y * width + x2) as usize]
    } else {
        g1
    };
    (
        (1.0 - ofs) * f32::from(g1.x) + ofs * f32::from(g2.x),
        (1.0 - ofs) * f32::from(g1.y) + ofs * f32::from(g2.y),
    )
}

#[cfg(test)]
mod tests {
    use super::{CostComputer, COST_PUNISH};
    use crate::geometry::{DisparityPlane, Gradient};
    use crate::image::BgrImage;
    use crate::options::PmsOptions;

    fn flat_image(width: usize, height: usize, value: u8) -> Vec<u8> {
        vec![value; width * height * 3]
    }

    fn options(patch_size: usize) -> PmsOptions {
        PmsOptions {
            patch_size,
            min_disparity: 0,
            max_disparity: 4,
            ..Default::default()
        }
    }

    #[test]
    fn out_of_image_match_pays_the_fixed_penalty() {
        let data = flat_image(4, 3, 100);
        let img = BgrImage::from_slice(&data, 4, 3).unwrap();
        let grad = vec![Gradient::default(); 12];
        let opts = options(3);
        let cc = CostComputer::new(img, img, &grad, &grad, 0, 4, &opts);
        let expected = (1.0 - opts.alpha) * opts.tau_col + opts.alpha * opts.tau_grad;
        assert_eq!(cc.compute(0, 0, 1.0), expected);
        assert_eq!(cc.compute(3, 0, -2.0), expected);
    }

    #[test]
    fn identical_views_have_zero_cost_at_zero_disparity() {
        let data = flat_image(5, 5, 90);
        let img = BgrImage::from_slice(&data, 5, 5).unwrap();
        let grad = vec![Gradient::default(); 25];
        let opts = options(3);
        let cc = CostComputer::new(img, img, &grad, &grad, 0, 4, &opts);
        assert_eq!(cc.compute(2, 2, 0.0), 0.0);
        let zero_plane = DisparityPlane::new(0.0, 0.0, 0.0);
        assert_eq!(cc.compute_aggregated(2, 2, zero_plane), 0.0);
    }

    #[test]
    fn out_of_range_plane_accumulates_punishment() {
        let data = flat_image(5, 5, 90);
        let img = BgrImage::from_slice(&data, 5, 5).unwrap();
        let grad = vec![Gradient::default(); 25];
        let opts = options(3);
        let cc = CostComputer::new(img, img, &grad, &grad, 0, 4, &opts);
        let plane = DisparityPlane::new(0.0, 0.0, 100.0);
        assert_eq!(cc.compute_aggregated(2, 2, plane), 9.0 * COST_PUNISH);
    }

    #[test]
    fn non_finite_plane_loses_every_comparison() {
        let data = flat_image(5, 5, 90);
        let img = BgrImage::from_slice(&data, 5, 5).unwrap();
        let grad = vec![Gradient::default(); 25];
        let opts = options(3);
        let cc = CostComputer::new(img, img, &grad, &grad, 0, 4, &opts);
        let singular = DisparityPlane::new(1.0, 0.0, 2.0).to_other_view();
        let cost = cc.compute_aggregated(2, 2, singular);
        assert_eq!(cost, 9.0 * COST_PUNISH);
    }

    #[test]
    fn aggregated_cost_is_bounded() {
        let width = 6;
        let height = 6;
        let mut data = Vec::with_capacity(width * height * 3);
        for i in 0..width * height * 3 {
            data.push(((i * 37) % 256) as u8);
        }
        let img = BgrImage::from_slice(&data, width, height).unwrap();
        let grad: Vec<Gradient> = (0..width * height)
            .map(|i| Gradient::new((i % 7) as i16 - 3, (i % 5) as i16 - 2))
            .collect();
        let opts = options(5);
        let cc = CostComputer::new(img, img, &grad, &grad, 0, 4, &opts);
        let penalty = (1.0 - opts.alpha) * opts.tau_col + opts.alpha * opts.tau_grad;
        let bound = 25.0 * COST_PUNISH.max(penalty);
        for (x, y) in [(0, 0), (2, 3), (5, 5)] {
            for plane in [
                DisparityPlane::new(0.0, 0.0, 2.0),
                DisparityPlane::new(0.5, -0.25, 1.0),
                DisparityPlane::new(0.0, 0.0, 50.0),
            ] {
                let cost = cc.compute_aggregated(x, y, plane);
                assert!(cost >= 0.0);
                assert!(cost <= bound, "cost {cost} above bound {bound}");
            }
        }
    }

    #[test]
    fn fractional_disparity_interpolates_along_x() {
        // Column ramp in every channel: I(x) = 40 * x.
        let width = 4;
        let mut data = Vec::new();
        for _y in 0..2 {
            for x in 0..width {
                let v = (40 * x) as u8;
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let img = BgrImage::from_slice(&data, width, 2).unwrap();
        let grad = vec![Gradient::default(); width * 2];
        let opts = PmsOptions {
            patch_size: 1,
            tau_col: 1000.0,
            alpha: 0.5,
            ..options(1)
        };
        let cc = CostComputer::new(img, img, &grad, &grad, 0, 4, &opts);
        // Matching x=2 at d=0.5 samples column 1.5 -> value 60, color
        // distance 3 * |80 - 60| = 60, gradient distance 0.
        let cost = cc.compute(2, 0, 0.5);
        assert!((cost - 0.5 * 60.0).abs() < 1e-3);
    }
}
