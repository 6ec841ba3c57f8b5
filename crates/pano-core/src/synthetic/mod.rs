//! Synthetic scenario builders.
//!
//! Ground-truth rigs with known rotations and intrinsics, used by the
//! test harness to produce correspondence graphs with exactly zero
//! reprojection error at the true parameters.

mod sphere;

pub use sphere::*;
