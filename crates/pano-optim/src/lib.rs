//! Non-linear refinement for rotation-only panoramic rigs.
//!
//! The crate splits into independent layers:
//!
//! - [`traits`]: dense [`NllsProblem`] / [`NllsSolverBackend`] contracts;
//! - [`backend_lm`]: Levenberg-Marquardt backend over the
//!   `levenberg-marquardt` crate;
//! - [`params`]: parameter blocks and per-scalar fixing masks;
//! - [`factors`]: analytic-Jacobian reprojection residuals;
//! - [`problems`]: problem builders and solve entry points.

pub mod backend_lm;
pub mod factors;
pub mod params;
pub mod problems;
pub mod traits;

pub use backend_lm::LmBackend;
pub use factors::{PairJacobians, PairReprojectionFactor, Slot};
pub use params::{FixedMask, IntrinsicBlocks, RotationBlock};
pub use problems::{
    build_panorama_problem, solve_panorama, PanoramaParamPolicy, PanoramaProblem, PanoramaResult,
    PanoramaViews, ViewParamPolicy,
};
pub use traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
