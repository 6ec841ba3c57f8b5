//! Equidistant camera model building blocks.
//!
//! The pixel chain has three stages:
//!
//! 1. equidistant projection: camera-frame direction to the normalized
//!    plane (image radius proportional to the incidence angle),
//! 2. radial distortion (`RadialK3`) in normalized space,
//! 3. sensor scaling: `pixel = radius * p + principal_point`.
//!
//! Every stage exposes the analytic Jacobians the reprojection factor
//! chains together. Serializable parameter structs cover the
//! scene-loader boundary.

mod distortion;
mod equidistant;
mod params;

pub use distortion::*;
pub use equidistant::*;
pub use params::*;
