//! Mathematical utilities and type definitions.
//!
//! This module provides fundamental types used throughout the library
//! and the SO(3) manifold operations for rotation-only poses.

use nalgebra::{Matrix3, Vector2, Vector3};

pub mod so3;

pub use so3::{left_jacobian, local_jacobian, log_so3, retract, skew};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
