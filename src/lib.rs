//! pmstereo computes dense disparity maps from rectified stereo pairs with
//! the PatchMatch Stereo algorithm.
//!
//! Each pixel carries a 3D disparity plane rather than a scalar disparity.
//! Starting from random planes, alternating left/right raster sweeps refine
//! the assignment through spatial propagation, stochastic plane refinement
//! and cross-view propagation, scored by a bilateral-weighted color+gradient
//! patch cost. Optional post-processing cross-validates the two views and
//! fills the rejected pixels by plane extrapolation plus weighted median
//! filtering.
//!
//! The core is single-threaded and synchronous by design: cross-view
//! propagation requires the left sweep of an iteration to complete before
//! the right sweep sees its writes.

pub mod filter;
pub mod geometry;
pub mod image;
pub mod lowlevel;
pub mod util;

mod cost;
mod matcher;
mod options;
mod propagation;
mod trace;

pub use geometry::{DisparityPlane, Gradient, Vector3};
pub use image::BgrImage;
pub use matcher::{PatchMatchStereo, View, INVALID_DISPARITY};
pub use options::PmsOptions;
pub use util::{PmsError, PmsResult};
