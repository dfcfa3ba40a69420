//! Low-level building blocks for custom stereo pipelines.
//!
//! These expose the cost computer, the per-view propagation engine and the
//! post-processing helpers for advanced use cases beyond the high-level
//! [`PatchMatchStereo`](crate::PatchMatchStereo) API. Most users should
//! prefer the top-level matcher.

pub use crate::cost::CostComputer;
pub use crate::matcher::{check_view, fill_view_holes};
pub use crate::propagation::PropagationEngine;
pub use crate::util::math::fast_exp;
