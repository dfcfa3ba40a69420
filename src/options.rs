//! Matcher configuration.

use crate::util::{PmsError, PmsResult};

/// Configuration bundle for [`PatchMatchStereo`](crate::PatchMatchStereo).
///
/// Read once at construction/reset time and immutable during a match. The
/// disparity range applies to the left view; the right view uses the negated
/// and swapped range internally.
#[derive(Copy, Clone, Debug)]
pub struct PmsOptions {
    /// Side length of the square aggregation window. Must be odd.
    pub patch_size: usize,
    /// Minimum disparity, inclusive.
    pub min_disparity: i32,
    /// Maximum disparity, inclusive. Must exceed `min_disparity`.
    pub max_disparity: i32,
    /// Bilateral weight falloff: `w = exp(-color_distance / gamma)`.
    pub gamma: f32,
    /// Blend between color and gradient dissimilarity.
    pub alpha: f32,
    /// Truncation threshold for the color term.
    pub tau_col: f32,
    /// Truncation threshold for the gradient term.
    pub tau_grad: f32,
    /// Number of propagation iterations (one left and one right sweep each).
    pub num_iters: usize,
    /// Run the left-right consistency check after matching.
    pub check_lr: bool,
    /// Consistency threshold: matched disparities must sum to at most this
    /// in absolute value.
    pub lrcheck_thresh: f32,
    /// Fill invalidated pixels by plane extrapolation along rows.
    pub fill_holes: bool,
    /// Force frontal-parallel windows: normals pinned to (0, 0, 1) and plane
    /// refinement skipped.
    pub force_fpw: bool,
    /// Round all sampled disparities to integers.
    pub integer_disp: bool,
    /// Seed for the per-match random source. `None` seeds from entropy and
    /// gives non-reproducible results.
    pub seed: Option<u64>,
}

impl Default for PmsOptions {
    fn default() -> Self {
        Self {
            patch_size: 35,
            min_disparity: 0,
            max_disparity: 64,
            gamma: 10.0,
            alpha: 0.9,
            tau_col: 10.0,
            tau_grad: 2.0,
            num_iters: 3,
            check_lr: false,
            lrcheck_thresh: 0.0,
            fill_holes: false,
            force_fpw: false,
            integer_disp: false,
            seed: None,
        }
    }
}

impl PmsOptions {
    /// Checks the documented constraints on every field.
    pub fn validate(&self) -> PmsResult<()> {
        if self.patch_size == 0 || self.patch_size % 2 == 0 {
            return Err(PmsError::InvalidOptions("patch_size must be odd"));
        }
        if self.min_disparity >= self.max_disparity {
            return Err(PmsError::InvalidOptions(
                "min_disparity must be below max_disparity",
            ));
        }
        for (value, message) in [
            (self.gamma, "gamma must be positive"),
            (self.alpha, "alpha must be positive"),
            (self.tau_col, "tau_col must be positive"),
            (self.tau_grad, "tau_grad must be positive"),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(PmsError::InvalidOptions(message));
            }
        }
        if self.lrcheck_thresh.is_nan() || self.lrcheck_thresh < 0.0 {
            return Err(PmsError::InvalidOptions(
                "lrcheck_thresh must be non-negative",
            ));
        }
        Ok(())
    }

    /// The options seen by the right view: disparity range negated and
    /// swapped, everything else unchanged.
    pub(crate) fn mirrored(&self) -> Self {
        Self {
            min_disparity: -self.max_disparity,
            max_disparity: -self.min_disparity,
            ..*self
        }
    }
}
