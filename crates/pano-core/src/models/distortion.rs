use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::math::{Real, Vec2};

/// Jacobian of a 2D point map with respect to the three distortion
/// coefficients.
pub type CoeffJacobian = nalgebra::SMatrix<Real, 2, 3>;

/// Odd-order radial distortion in normalized coordinates:
/// `p_d = p * (1 + k1 r² + k2 r⁴ + k3 r⁶)` with `r = |p|`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadialK3 {
    pub k1: Real,
    pub k2: Real,
    pub k3: Real,
}

impl RadialK3 {
    const NEWTON_ITERS: u32 = 20;

    /// Radial scale factor `1 + k1 t + k2 t² + k3 t³` at `t = r²`.
    fn scale(&self, r2: Real) -> Real {
        1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3))
    }

    /// Derivative of [`Self::scale`] with respect to `t = r²`.
    fn scale_deriv(&self, r2: Real) -> Real {
        self.k1 + r2 * (2.0 * self.k2 + r2 * 3.0 * self.k3)
    }

    /// Apply forward distortion.
    pub fn distort(&self, p: &Vec2) -> Vec2 {
        p * self.scale(p.norm_squared())
    }

    /// Invert the forward model by Newton iteration on the scalar
    /// radius. The distorted and undistorted points share a direction,
    /// so only `r (1 + k1 r² + k2 r⁴ + k3 r⁶) = r_d` has to be solved.
    pub fn undistort(&self, p_d: &Vec2) -> Vec2 {
        let rd = p_d.norm();
        if rd == 0.0 {
            return *p_d;
        }

        let mut r = rd;
        for _ in 0..Self::NEWTON_ITERS {
            let r2 = r * r;
            let g = r * self.scale(r2) - rd;
            let dg = self.scale(r2) + 2.0 * r2 * self.scale_deriv(r2);
            if dg.abs() < Real::EPSILON {
                break;
            }
            let step = g / dg;
            r -= step;
            if step.abs() < 1e-15 {
                break;
            }
        }

        p_d * (r / rd)
    }

    /// Jacobian of [`Self::distort`] with respect to the point:
    /// `f(r²) I + 2 f'(r²) p pᵀ`.
    pub fn jacobian_point(&self, p: &Vec2) -> Matrix2<Real> {
        let r2 = p.norm_squared();
        let f = self.scale(r2);
        let df = self.scale_deriv(r2);
        Matrix2::identity() * f + (p * p.transpose()) * (2.0 * df)
    }

    /// Jacobian of [`Self::distort`] with respect to `(k1, k2, k3)`:
    /// columns `p r²`, `p r⁴`, `p r⁶`.
    pub fn jacobian_coeffs(&self, p: &Vec2) -> CoeffJacobian {
        let r2 = p.norm_squared();
        let mut j = CoeffJacobian::zeros();
        let mut t = r2;
        for col in 0..3 {
            j[(0, col)] = p.x * t;
            j[(1, col)] = p.y * t;
            t *= r2;
        }
        j
    }

    /// Jacobian of [`Self::undistort`] with respect to the distorted
    /// point, by the inverse function theorem at the undistorted point.
    pub fn jacobian_undistort_point(&self, p_d: &Vec2) -> Matrix2<Real> {
        let p = self.undistort(p_d);
        self.jacobian_point(&p)
            .try_inverse()
            .unwrap_or_else(Matrix2::identity)
    }

    /// Jacobian of [`Self::undistort`] with respect to `(k1, k2, k3)`:
    /// implicit differentiation of `distort(undistort(p_d; k); k) = p_d`
    /// gives `-J_point(p)⁻¹ J_coeffs(p)` at the undistorted point.
    pub fn jacobian_undistort_coeffs(&self, p_d: &Vec2) -> CoeffJacobian {
        let p = self.undistort(p_d);
        let inv = self
            .jacobian_point(&p)
            .try_inverse()
            .unwrap_or_else(Matrix2::identity);
        -inv * self.jacobian_coeffs(&p)
    }
}
