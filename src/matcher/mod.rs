//! The stereo orchestrator: owns both views' state and drives the full
//! matching pipeline.
//!
//! A match runs random plane initialization, grayscale and gradient
//! computation, `num_iters` alternating left/right propagation sweeps,
//! plane-to-disparity conversion and the optional left-right consistency
//! check and hole filling, then copies the left disparity map into the
//! caller's buffer. All working memory is allocated once at construction and
//! reused across calls.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::filter::weighted_median_filter;
use crate::geometry::{DisparityPlane, Gradient, Vector3};
use crate::image::{gray_image, sobel_gradients, BgrImage};
use crate::options::PmsOptions;
use crate::propagation::PropagationEngine;
use crate::trace::{trace_event, trace_span};
use crate::util::{PmsError, PmsResult};

/// Sentinel for a pixel with no resolved disparity. Can never result from
/// evaluating a finite plane, so it is always unambiguous.
pub const INVALID_DISPARITY: f32 = f32::INFINITY;

/// Selects one of the two rectified views.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum View {
    Left,
    Right,
}

/// Per-view working state, all arrays indexed by `y * width + x`.
struct ViewState {
    gray: Vec<u8>,
    grad: Vec<Gradient>,
    cost: Vec<f32>,
    plane: Vec<DisparityPlane>,
    disp: Vec<f32>,
    mismatches: Vec<(i32, i32)>,
}

impl ViewState {
    fn new(len: usize) -> Self {
        Self {
            gray: vec![0; len],
            grad: vec![Gradient::default(); len],
            cost: vec![0.0; len],
            plane: vec![DisparityPlane::default(); len],
            disp: vec![INVALID_DISPARITY; len],
            mismatches: Vec::new(),
        }
    }
}

/// PatchMatch stereo matcher for rectified image pairs.
pub struct PatchMatchStereo {
    width: usize,
    height: usize,
    options: PmsOptions,
    left: ViewState,
    right: ViewState,
}

impl PatchMatchStereo {
    /// Allocates a matcher for `width x height` input pairs.
    pub fn new(width: usize, height: usize, options: PmsOptions) -> PmsResult<Self> {
        if width == 0 || height == 0 {
            return Err(PmsError::InvalidDimensions { width, height });
        }
        options.validate()?;
        let len = width
            .checked_mul(height)
            .ok_or(PmsError::InvalidDimensions { width, height })?;
        Ok(Self {
            width,
            height,
            options,
            left: ViewState::new(len),
            right: ViewState::new(len),
        })
    }

    /// Drops all buffers and re-initializes; equivalent to reconstruction.
    pub fn reset(&mut self, width: usize, height: usize, options: PmsOptions) -> PmsResult<()> {
        *self = Self::new(width, height, options)?;
        Ok(())
    }

    /// Configured image width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Configured image height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Computes the disparity map for a rectified pair.
    ///
    /// `disp_out` must hold `width * height` floats; on success it receives
    /// the left view's disparities, with [`INVALID_DISPARITY`] marking pixels
    /// the consistency check rejected and hole filling could not recover.
    pub fn match_images(
        &mut self,
        left: &BgrImage<'_>,
        right: &BgrImage<'_>,
        disp_out: &mut [f32],
    ) -> PmsResult<()> {
        for img in [left, right] {
            if img.width() != self.width || img.height() != self.height {
                return Err(PmsError::DimensionMismatch {
                    expected: (self.width, self.height),
                    got: (img.width(), img.height()),
                });
            }
        }
        let len = self.width * self.height;
        if disp_out.len() < len {
            return Err(PmsError::BufferTooSmall {
                needed: len,
                got: disp_out.len(),
            });
        }

        let _span = trace_span!("match", width = self.width, height = self.height).entered();

        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        self.random_init(&mut rng);

        gray_image(left, &mut self.left.gray);
        gray_image(right, &mut self.right.gray);
        sobel_gradients(&self.left.gray, self.width, self.height, &mut self.left.grad);
        sobel_gradients(
            &self.right.gray,
            self.width,
            self.height,
            &mut self.right.grad,
        );

        self.run_propagation(left, right, &mut rng);
        self.plane_to_disparity();

        if self.options.check_lr {
            self.lr_check();
            trace_event!(
                "lr_check",
                left_mismatches = self.left.mismatches.len(),
                right_mismatches = self.right.mismatches.len(),
            );
        }
        if self.options.fill_holes {
            self.fill_holes(left, right);
        }

        disp_out[..len].copy_from_slice(&self.left.disp);
        Ok(())
    }

    /// The given view's disparity map from the last match.
    pub fn disparity_map(&self, view: View) -> &[f32] {
        match view {
            View::Left => &self.left.disp,
            View::Right => &self.right.disp,
        }
    }

    /// The given view's Sobel gradient map from the last match.
    pub fn gradient_map(&self, view: View) -> &[Gradient] {
        match view {
            View::Left => &self.left.grad,
            View::Right => &self.right.grad,
        }
    }

    /// Samples every pixel's disparity uniformly from the configured range
    /// (negated for the right view) and a random plane normal, or the
    /// frontal-parallel normal (0, 0, 1) when forced.
    fn random_init<R: Rng>(&mut self, rng: &mut R) {
        let width = self.width as i32;
        let height = self.height as i32;
        let options = self.options;
        let min_d = options.min_disparity as f32;
        let max_d = options.max_disparity as f32;

        for (view, sign) in [(&mut self.left, 1.0f32), (&mut self.right, -1.0f32)] {
            for y in 0..height {
                for x in 0..width {
                    let p = (y * width + x) as usize;
                    let mut d = sign * rng.random_range(min_d..max_d);
                    if options.integer_disp {
                        d = d.round();
                    }
                    view.disp[p] = d;

                    let norm = if options.force_fpw {
                        Vector3::new(0.0, 0.0, 1.0)
                    } else {
                        let nx = rng.random_range(-1.0f32..1.0);
                        let ny = rng.random_range(-1.0f32..1.0);
                        let mut nz = rng.random_range(-1.0f32..1.0);
                        while nz == 0.0 {
                            nz = rng.random_range(-1.0f32..1.0);
                        }
                        Vector3::new(nx, ny, nz).normalized()
                    };
                    view.plane[p] = DisparityPlane::from_normal(x, y, norm, d);
                }
            }
        }
    }

    /// Alternating left/right sweeps; a left sweep always completes before
    /// the right sweep of the same iteration, so cross-view propagation from
    /// the left is visible to the right immediately.
    fn run_propagation<R: Rng>(
        &mut self,
        left_img: &BgrImage<'_>,
        right_img: &BgrImage<'_>,
        rng: &mut R,
    ) {
        let _span = trace_span!("propagation", iters = self.options.num_iters).entered();

        let mut engine_left = PropagationEngine::new(
            *left_img,
            *right_img,
            &self.left.grad,
            &self.right.grad,
            self.options,
        );
        let mut engine_right = PropagationEngine::new(
            *right_img,
            *left_img,
            &self.right.grad,
            &self.left.grad,
            self.options.mirrored(),
        );

        engine_left.compute_initial_costs(&self.left.plane, &mut self.left.cost);
        engine_right.compute_initial_costs(&self.right.plane, &mut self.right.cost);

        for _ in 0..self.options.num_iters {
            engine_left.propagate(
                &mut self.left.plane,
                &mut self.left.cost,
                &mut self.right.plane,
                &mut self.right.cost,
                rng,
            );
            engine_right.propagate(
                &mut self.right.plane,
                &mut self.right.cost,
                &mut self.left.plane,
                &mut self.left.cost,
                rng,
            );
        }
    }

    fn plane_to_disparity(&mut self) {
        let width = self.width as i32;
        let height = self.height as i32;
        for view in [&mut self.left, &mut self.right] {
            for y in 0..height {
                for x in 0..width {
                    let p = (y * width + x) as usize;
                    view.disp[p] = view.plane[p].to_disparity(x, y);
                }
            }
        }
    }

    /// Cross-validates both views. The left check runs first, so right-view
    /// pixels matching freshly invalidated left pixels fail as well.
    fn lr_check(&mut self) {
        let width = self.width as i32;
        let height = self.height as i32;
        let threshold = self.options.lrcheck_thresh;
        check_view(
            &mut self.left.disp,
            &self.right.disp,
            &mut self.left.mismatches,
            width,
            height,
            threshold,
        );
        check_view(
            &mut self.right.disp,
            &self.left.disp,
            &mut self.right.mismatches,
            width,
            height,
            threshold,
        );
    }

    /// Fills recorded mismatch pixels by horizontal plane extrapolation, then
    /// smooths them with the weighted median filter. Consumes both views'
    /// mismatch sets.
    fn fill_holes(&mut self, left_img: &BgrImage<'_>, right_img: &BgrImage<'_>) {
        let patch_size = self.options.patch_size;
        let gamma = self.options.gamma;
        if !self.left.mismatches.is_empty() {
            fill_view_holes(
                left_img,
                &self.left.plane,
                &mut self.left.disp,
                &self.left.mismatches,
                patch_size,
                gamma,
            );
        }
        self.left.mismatches.clear();
        if !self.right.mismatches.is_empty() {
            fill_view_holes(
                right_img,
                &self.right.plane,
                &mut self.right.disp,
                &self.right.mismatches,
                patch_size,
                gamma,
            );
        }
        self.right.mismatches.clear();
    }
}

/// One view's side of the consistency check.
///
/// Pixels whose matched column leaves the image, or whose disparity does not
/// cancel the counterpart's within `threshold` (the views carry opposite
/// signs), are set to [`INVALID_DISPARITY`] and recorded. Already-invalid
/// pixels are recorded without re-checking.
pub fn check_view(
    disp: &mut [f32],
    other_disp: &[f32],
    mismatches: &mut Vec<(i32, i32)>,
    width: i32,
    height: i32,
    threshold: f32,
) {
    mismatches.clear();
    for y in 0..height {
        for x in 0..width {
            let p = (y * width + x) as usize;
            let d = disp[p];
            if !d.is_finite() {
                mismatches.push((x, y));
                continue;
            }

            let col_other = (x as f32 - d).round() as i32;
            if col_other >= 0 && col_other < width {
                let d_other = other_disp[(y * width + col_other) as usize];
                if (d + d_other).abs() > threshold {
                    disp[p] = INVALID_DISPARITY;
                    mismatches.push((x, y));
                }
            } else {
                disp[p] = INVALID_DISPARITY;
                mismatches.push((x, y));
            }
        }
    }
}

/// Fills each mismatch pixel from the nearest valid planes along its row.
///
/// One candidate extrapolates directly; with two, the smaller-magnitude
/// disparity wins (occluded regions usually belong to the background). Fills
/// are computed against the pre-fill map, written back in one pass, then
/// smoothed by the weighted median filter at the originally-mismatched
/// pixels only.
pub fn fill_view_holes(
    img: &BgrImage<'_>,
    planes: &[DisparityPlane],
    disp: &mut [f32],
    mismatches: &[(i32, i32)],
    patch_size: usize,
    gamma: f32,
) {
    let width = img.width() as i32;
    let mut fills = vec![INVALID_DISPARITY; mismatches.len()];

    for (fill, &(x, y)) in fills.iter_mut().zip(mismatches) {
        let row = (y * width) as usize;

        let mut forward = None;
        let mut xs = x + 1;
        while xs < width {
            if disp[row + xs as usize].is_finite() {
                forward = Some(planes[row + xs as usize]);
                break;
            }
            xs += 1;
        }

        let mut backward = None;
        let mut xs = x - 1;
        while xs >= 0 {
            if disp[row + xs as usize].is_finite() {
                backward = Some(planes[row + xs as usize]);
                break;
            }
            xs -= 1;
        }

        *fill = match (forward, backward) {
            (None, None) => INVALID_DISPARITY,
            (Some(plane), None) | (None, Some(plane)) => plane.to_disparity(x, y),
            (Some(fwd), Some(bwd)) => {
                let d1 = fwd.to_disparity(x, y);
                let d2 = bwd.to_disparity(x, y);
                if d1.abs() < d2.abs() {
                    d1
                } else {
                    d2
                }
            }
        };
    }

    for (fill, &(x, y)) in fills.iter().zip(mismatches) {
        disp[(y * width + x) as usize] = *fill;
    }

    weighted_median_filter(img, patch_size, gamma, mismatches, disp);
}

#[cfg(test)]
mod tests {
    use super::{check_view, fill_view_holes, INVALID_DISPARITY};
    use crate::geometry::DisparityPlane;
    use crate::image::BgrImage;

    #[test]
    fn consistent_pair_has_no_mismatches() {
        // Exact negatives at every matched pixel: d_left(x) = 1 maps x to
        // x - 1 in the right view, where d_right = -1.
        let width = 4;
        let mut left = vec![1.0f32; 4];
        let right = vec![-1.0f32; 4];
        let mut mismatches = Vec::new();
        check_view(&mut left, &right, &mut mismatches, width, 1, 0.5);
        // x = 0 maps to column -1, out of bounds.
        assert_eq!(mismatches, vec![(0, 0)]);
        assert_eq!(left[0], INVALID_DISPARITY);
        assert!(left[1..].iter().all(|d| *d == 1.0));
    }

    #[test]
    fn perturbed_pixel_is_the_only_extra_mismatch() {
        let width = 5;
        let mut left = vec![0.0f32; 5];
        let mut right = vec![0.0f32; 5];
        right[2] = 3.0; // breaks the pair (2, 2)
        let mut mismatches = Vec::new();
        check_view(&mut left, &right, &mut mismatches, width, 1, 0.5);
        assert_eq!(mismatches, vec![(2, 0)]);
        assert_eq!(left[2], INVALID_DISPARITY);

        // The right view's own check, run after the left invalidation.
        let mut mismatches_r = Vec::new();
        check_view(&mut right, &left, &mut mismatches_r, width, 1, 0.5);
        assert!(mismatches_r.contains(&(2, 0)));
    }

    #[test]
    fn already_invalid_pixels_are_recorded_without_rechecking() {
        let mut left = vec![INVALID_DISPARITY, 0.0, 0.0];
        let right = vec![0.0f32; 3];
        let mut mismatches = Vec::new();
        check_view(&mut left, &right, &mut mismatches, 3, 1, 0.5);
        assert_eq!(mismatches, vec![(0, 0)]);
    }

    #[test]
    fn holes_fill_from_the_smaller_magnitude_side() {
        let width = 5;
        let data = vec![100u8; width * 3];
        let img = BgrImage::from_slice(&data, width, 1).unwrap();
        let planes = vec![
            DisparityPlane::new(0.0, 0.0, 1.0),
            DisparityPlane::default(),
            DisparityPlane::default(),
            DisparityPlane::default(),
            DisparityPlane::new(0.0, 0.0, 4.0),
        ];
        let mut disp = vec![1.0, INVALID_DISPARITY, INVALID_DISPARITY, INVALID_DISPARITY, 4.0];
        let holes = vec![(1, 0), (2, 0), (3, 0)];
        fill_view_holes(&img, &planes, &mut disp, &holes, 3, 10.0);
        // Both directions offer planes; |1| < |4| so the left plane wins
        // everywhere, and the weighted median over uniform color keeps it.
        for d in &disp {
            assert!(d.is_finite());
        }
        assert_eq!(disp[2], 1.0);
    }

    #[test]
    fn hole_with_one_valid_side_extrapolates_that_plane() {
        let width = 4;
        let data = vec![100u8; width * 3];
        let img = BgrImage::from_slice(&data, width, 1).unwrap();
        // Slanted plane at the right edge: d(x) = 0.5 * x.
        let slanted = DisparityPlane::new(0.5, 0.0, 0.0);
        let planes = vec![
            DisparityPlane::default(),
            DisparityPlane::default(),
            DisparityPlane::default(),
            slanted,
        ];
        let mut disp = vec![INVALID_DISPARITY, INVALID_DISPARITY, INVALID_DISPARITY, 1.5];
        let holes = vec![(0, 0), (1, 0), (2, 0)];
        fill_view_holes(&img, &planes, &mut disp, &holes, 1, 10.0);
        assert_eq!(disp[0], 0.0);
        assert_eq!(disp[1], 0.5);
        assert_eq!(disp[2], 1.0);
    }

    #[test]
    fn hole_with_no_valid_neighbor_stays_invalid() {
        let width = 3;
        let data = vec![100u8; width * 3];
        let img = BgrImage::from_slice(&data, width, 1).unwrap();
        let planes = vec![DisparityPlane::default(); 3];
        let mut disp = vec![INVALID_DISPARITY; 3];
        let holes = vec![(1, 0)];
        fill_view_holes(&img, &planes, &mut disp, &holes, 3, 10.0);
        assert_eq!(disp[1], INVALID_DISPARITY);
    }
}
