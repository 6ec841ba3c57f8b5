//! SO(3) manifold operations for rotation-only poses.
//!
//! Rotations are stored as 3×3 matrices. Local updates are parameterized
//! by a 3-vector tangent `delta` (axis–angle: norm = angle, direction =
//! axis) applied by left composition: `r' = Exp(delta) * r`. The
//! embedding space flattens matrix entries row-major, so embedding
//! coordinate `k` corresponds to entry `(k / 3, k % 3)`.

use nalgebra::{Rotation3, SMatrix, UnitQuaternion};

use super::{Mat3, Real, Vec3};

/// Hat operator: `skew(v) * w == v × w`.
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Apply a tangent-space update to a rotation: `Exp(delta) * r`.
///
/// The increment is rebuilt from the axis–angle vector on every call,
/// never accumulated additively, so the result stays orthonormal under
/// repeated retraction. A zero `delta` returns `r` unchanged.
pub fn retract(r: &Mat3, delta: &Vec3) -> Mat3 {
    if delta.norm_squared() == 0.0 {
        return *r;
    }
    Rotation3::new(*delta).matrix() * r
}

/// Jacobian of the nine row-major entries of `Exp(delta)` with respect
/// to `delta`, evaluated at `delta = 0`.
///
/// Since `Exp(delta) ≈ I + [delta]_x` to first order, only the six
/// off-diagonal entries carry ±1. The pattern is independent of the
/// current rotation; it is what maps the factor's 2×9 embedding
/// Jacobians onto the 3-dimensional tangent space.
pub fn local_jacobian() -> SMatrix<Real, 9, 3> {
    let mut j = SMatrix::<Real, 9, 3>::zeros();
    j[(1, 2)] = -1.0;
    j[(2, 1)] = 1.0;
    j[(3, 2)] = 1.0;
    j[(5, 0)] = -1.0;
    j[(6, 1)] = -1.0;
    j[(7, 0)] = 1.0;
    j
}

/// Left Jacobian of SO(3): `Exp(delta + d) ≈ Exp(left_jacobian(delta) * d) * Exp(delta)`.
///
/// Maps an additive change of the stored tangent vector to the
/// equivalent left-composed increment; the identity at `delta = 0`.
/// Needed when a dense solver updates a tangent segment additively away
/// from the base point.
pub fn left_jacobian(delta: &Vec3) -> Mat3 {
    let theta2 = delta.norm_squared();
    let hat = skew(delta);
    if theta2 < 1e-14 {
        return Mat3::identity() + hat * 0.5 + hat * hat * (1.0 / 6.0);
    }
    let theta = theta2.sqrt();
    let a = (1.0 - theta.cos()) / theta2;
    let b = (theta - theta.sin()) / (theta2 * theta);
    Mat3::identity() + hat * a + hat * hat * b
}

/// log: SO(3) -> so(3) as a 3-vector (axis * angle).
pub fn log_so3(r: &Mat3) -> Vec3 {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*r)).scaled_axis()
}
