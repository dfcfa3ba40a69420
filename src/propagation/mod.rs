//! One view's propagation sweep: spatial propagation, stochastic plane
//! refinement and cross-view propagation.
//!
//! The engine holds only immutable borrows (images, gradients, options); the
//! two views' plane and cost arrays are passed into every call, so the borrow
//! checker enforces the strictly sequenced mutation the algorithm relies on:
//! a left sweep completes before the right sweep of the same iteration and
//! sees its view-propagated planes.

use rand::Rng;

use crate::cost::CostComputer;
use crate::geometry::{DisparityPlane, Gradient, Vector3};
use crate::image::BgrImage;
use crate::options::PmsOptions;

/// Refinement stops once the disparity perturbation radius falls below this.
const REFINE_STOP_RADIUS: f32 = 0.1;

/// Propagation engine for one view.
///
/// `options` carries this view's signed disparity range; the counterpart
/// cost computer uses the negated and swapped range.
pub struct PropagationEngine<'a> {
    width: i32,
    height: i32,
    options: PmsOptions,
    cost_self: CostComputer<'a>,
    cost_other: CostComputer<'a>,
    num_iter: usize,
}

impl<'a> PropagationEngine<'a> {
    /// Builds the engine for the view whose image is `img_p`.
    pub fn new(
        img_p: BgrImage<'a>,
        img_q: BgrImage<'a>,
        grad_p: &'a [Gradient],
        grad_q: &'a [Gradient],
        options: PmsOptions,
    ) -> Self {
        let cost_self = CostComputer::new(
            img_p,
            img_q,
            grad_p,
            grad_q,
            options.min_disparity,
            options.max_disparity,
            &options,
        );
        let cost_other = CostComputer::new(
            img_q,
            img_p,
            grad_q,
            grad_p,
            -options.max_disparity,
            -options.min_disparity,
            &options,
        );
        Self {
            width: img_p.width() as i32,
            height: img_p.height() as i32,
            options,
            cost_self,
            cost_other,
            num_iter: 0,
        }
    }

    /// Aggregated cost of every pixel's initial plane.
    pub fn compute_initial_costs(&self, planes: &[DisparityPlane], costs: &mut [f32]) {
        for y in 0..self.height {
            for x in 0..self.width {
                let p = (y * self.width + x) as usize;
                costs[p] = self.cost_self.compute_aggregated(x, y, planes[p]);
            }
        }
    }

    /// One full boustrophedon sweep over the view.
    ///
    /// Even sweeps scan top-left to bottom-right, odd sweeps the reverse, so
    /// propagation reach is not biased toward one corner. `planes`/`costs`
    /// belong to this view, `other_planes`/`other_costs` to the counterpart.
    pub fn propagate<R: Rng>(
        &mut self,
        planes: &mut [DisparityPlane],
        costs: &mut [f32],
        other_planes: &mut [DisparityPlane],
        other_costs: &mut [f32],
        rng: &mut R,
    ) {
        let dir: i32 = if self.num_iter % 2 == 0 { 1 } else { -1 };
        let mut y = if dir == 1 { 0 } else { self.height - 1 };
        for _ in 0..self.height {
            let mut x = if dir == 1 { 0 } else { self.width - 1 };
            for _ in 0..self.width {
                self.spatial_propagation(x, y, dir, planes, costs);
                if !self.options.force_fpw {
                    self.plane_refine(x, y, planes, costs, rng);
                }
                self.view_propagation(x, y, planes, other_planes, other_costs);
                x += dir;
            }
            y += dir;
        }
        self.num_iter += 1;
    }

    /// Tries the upstream x and y neighbors' planes at `(x, y)` and keeps the
    /// cheapest.
    fn spatial_propagation(
        &self,
        x: i32,
        y: i32,
        dir: i32,
        planes: &mut [DisparityPlane],
        costs: &mut [f32],
    ) {
        let p = (y * self.width + x) as usize;

        let xd = x - dir;
        if xd >= 0 && xd < self.width {
            let candidate = planes[(y * self.width + xd) as usize];
            if candidate != planes[p] {
                let cost = self.cost_self.compute_aggregated(x, y, candidate);
                if cost < costs[p] {
                    planes[p] = candidate;
                    costs[p] = cost;
                }
            }
        }

        let yd = y - dir;
        if yd >= 0 && yd < self.height {
            let candidate = planes[(yd * self.width + x) as usize];
            if candidate != planes[p] {
                let cost = self.cost_self.compute_aggregated(x, y, candidate);
                if cost < costs[p] {
                    planes[p] = candidate;
                    costs[p] = cost;
                }
            }
        }
    }

    /// Logarithmic stochastic local search around the current plane.
    ///
    /// Both perturbation radii halve every round whether or not a candidate
    /// is accepted, so the search anneals from half the disparity range down
    /// to sub-pixel adjustments.
    fn plane_refine<R: Rng>(
        &self,
        x: i32,
        y: i32,
        planes: &mut [DisparityPlane],
        costs: &mut [f32],
        rng: &mut R,
    ) {
        let min_disp = self.options.min_disparity as f32;
        let max_disp = self.options.max_disparity as f32;
        let p = (y * self.width + x) as usize;

        let mut d_p = planes[p].to_disparity(x, y);
        let mut norm_p = planes[p].to_normal();

        let mut disp_radius = (max_disp - min_disp) / 2.0;
        let mut norm_radius = 1.0f32;

        while disp_radius > REFINE_STOP_RADIUS {
            let mut disp_delta = rng.random_range(-1.0f32..1.0) * disp_radius;
            if self.options.integer_disp {
                disp_delta = disp_delta.round();
            }
            let d_new = d_p + disp_delta;
            if d_new < min_disp || d_new > max_disp {
                disp_radius /= 2.0;
                norm_radius /= 2.0;
                continue;
            }

            let dx = rng.random_range(-1.0f32..1.0) * norm_radius;
            let dy = rng.random_range(-1.0f32..1.0) * norm_radius;
            // A zero z component would make the perturbed plane degenerate.
            let mut dz = rng.random_range(-1.0f32..1.0) * norm_radius;
            while dz == 0.0 {
                dz = rng.random_range(-1.0f32..1.0) * norm_radius;
            }
            let delta = Vector3::new(dx, dy, dz);
            let norm_new = (norm_p + delta).normalized();
            let plane_new = DisparityPlane::from_normal(x, y, norm_new, d_new);

            if plane_new != planes[p] {
                let cost = self.cost_self.compute_aggregated(x, y, plane_new);
                if cost < costs[p] {
                    planes[p] = plane_new;
                    costs[p] = cost;
                    d_p = d_new;
                    norm_p = norm_new;
                }
            }

            disp_radius /= 2.0;
            norm_radius /= 2.0;
        }
    }

    /// Projects this pixel's plane into the counterpart view and installs it
    /// there when it wins the cost comparison. Out-of-bounds matched columns
    /// are a silent no-op.
    fn view_propagation(
        &self,
        x: i32,
        y: i32,
        planes: &[DisparityPlane],
        other_planes: &mut [DisparityPlane],
        other_costs: &mut [f32],
    ) {
        let plane_p = planes[(y * self.width + x) as usize];
        let d_p = plane_p.to_disparity(x, y);

        let xq = (x as f32 - d_p).round() as i32;
        if xq < 0 || xq >= self.width {
            return;
        }

        let q = (y * self.width + xq) as usize;
        let plane_q = plane_p.to_other_view();
        let cost = self.cost_other.compute_aggregated(xq, y, plane_q);
        if cost < other_costs[q] {
            other_planes[q] = plane_q;
            other_costs[q] = cost;
        }
    }
}
