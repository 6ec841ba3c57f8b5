//! Residual factors.

mod pair_reprojection;

pub use pair_reprojection::{PairJacobians, PairReprojectionFactor, Slot, NUM_SLOTS};
