//! Core math and geometry primitives for `pano-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, ...) and the SO(3)
//!   rotation manifold used for rotation-only pose updates,
//! - the equidistant (fisheye) camera model with radial distortion,
//!   visibility predicates, and an analytic derivative family,
//! - the cross-view correspondence graph and a synthetic sphere-sampling
//!   harness that produces one.
//!
//! Camera pipeline:
//! `pixel = radius * distortion(equidistant(dir)) + principal_point`
//!
//! All views share a single optical center; a view is fully described by
//! its camera model and a rotation relative to the rig frame.

/// Linear algebra type aliases and the SO(3) manifold.
pub mod math;
/// Equidistant camera model and distortion utilities.
pub mod models;
/// Cross-view point correspondences.
pub mod correspondence;
/// Synthetic sphere-sampling scenario builders.
pub mod synthetic;

pub use correspondence::*;
pub use math::*;
pub use models::*;
