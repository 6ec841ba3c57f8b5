use nalgebra::{Matrix2, SMatrix};

use super::RadialK3;
use crate::math::{Real, Vec2, Vec3};

/// Jacobian of a pixel map with respect to a 3D direction.
pub type DirJacobian = SMatrix<Real, 2, 3>;
/// Jacobian of the unit-sphere lift with respect to a normalized point.
pub type SphereJacobian = SMatrix<Real, 3, 2>;

/// Equidistant (fisheye) camera model with radial distortion.
///
/// The normalized image radius is proportional to the incidence angle
/// from the optical axis and equals 1 at the half field of view. Pixels
/// are obtained by scaling with the sensor circle radius and offsetting
/// by the principal point.
///
/// Directions are taken in the view's local frame; the model is
/// scale-invariant in the direction, so callers may pass unit or
/// unnormalized rays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EquidistantFisheye {
    /// Image width in pixels.
    pub width: Real,
    /// Image height in pixels.
    pub height: Real,
    /// Full angular field of view in radians.
    pub fov: Real,
    /// Principal point in pixels.
    pub pp: Vec2,
    /// Sensor circle radius in pixels (normalized radius 1).
    pub radius: Real,
    /// Radial distortion acting in normalized coordinates.
    pub disto: RadialK3,
}

/// Rays closer to the optical axis than this are projected with the
/// small-angle limit formulas.
const AXIS_EPS: Real = 1e-12;
/// Slack applied to the visibility boundary tests so a ray exactly at
/// the field-of-view limit is classified visible by both predicates.
const BOUNDARY_TOL: Real = 1e-12;

impl EquidistantFisheye {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: Real,
        height: Real,
        fov: Real,
        cx: Real,
        cy: Real,
        radius: Real,
        k1: Real,
        k2: Real,
        k3: Real,
    ) -> Self {
        Self {
            width,
            height,
            fov,
            pp: Vec2::new(cx, cy),
            radius,
            disto: RadialK3 { k1, k2, k3 },
        }
    }

    fn half_fov(&self) -> Real {
        0.5 * self.fov
    }

    /// Equidistant projection of a camera-frame direction onto the
    /// normalized plane: radius `theta / (fov / 2)` along the radial
    /// direction, where `theta` is the incidence angle.
    pub fn project_dir(&self, dir: &Vec3) -> Vec2 {
        let rho = dir.xy().norm();
        if rho < AXIS_EPS {
            return Vec2::zeros();
        }
        let theta = rho.atan2(dir.z);
        dir.xy() * (theta / (self.half_fov() * rho))
    }

    /// Full forward chain: direction to pixel, optionally through the
    /// distortion stage.
    pub fn world_to_image(&self, dir: &Vec3, apply_distortion: bool) -> Vec2 {
        let p = self.project_dir(dir);
        let p = if apply_distortion {
            self.disto.distort(&p)
        } else {
            p
        };
        self.cam_to_image(&p)
    }

    /// Normalized (distorted) point to pixel.
    pub fn cam_to_image(&self, p: &Vec2) -> Vec2 {
        p * self.radius + self.pp
    }

    /// Pixel to normalized (still distorted) point; inverts only the
    /// principal-point/scale transform.
    pub fn image_to_cam(&self, pixel: &Vec2) -> Vec2 {
        (pixel - self.pp) / self.radius
    }

    /// Invert the radial distortion polynomial.
    pub fn remove_distortion(&self, p: &Vec2) -> Vec2 {
        self.disto.undistort(p)
    }

    /// Inverse equidistant mapping: normalized undistorted point to a
    /// unit direction.
    pub fn to_unit_sphere(&self, p: &Vec2) -> Vec3 {
        let rho = p.norm();
        if rho < AXIS_EPS {
            return Vec3::new(0.0, 0.0, 1.0);
        }
        let theta = rho * self.half_fov();
        let (sin_t, cos_t) = theta.sin_cos();
        Vec3::new(p.x / rho * sin_t, p.y / rho * sin_t, cos_t)
    }

    /// True when the incidence angle is within the half field of view.
    /// Rays past the visibility equator (antipodal grazing) fail this
    /// test for any field of view below 360 degrees.
    pub fn is_visible_ray(&self, dir: &Vec3) -> bool {
        let n = dir.norm();
        if !n.is_finite() || n == 0.0 {
            return false;
        }
        let theta = dir.xy().norm().atan2(dir.z);
        theta <= self.half_fov() + BOUNDARY_TOL
    }

    /// True when the pixel lies inside the image rectangle and its
    /// undistorted normalized radius is within the sensor circle.
    ///
    /// The circle test is performed on the undistorted radius so the
    /// boundary coincides exactly with the `is_visible_ray` cone.
    pub fn is_visible(&self, pixel: &Vec2) -> bool {
        if pixel.x < 0.0 || pixel.x >= self.width || pixel.y < 0.0 || pixel.y >= self.height {
            return false;
        }
        let n = self.remove_distortion(&self.image_to_cam(pixel));
        n.norm() <= 1.0 + BOUNDARY_TOL
    }

    /// Jacobian of [`Self::project_dir`] with respect to the direction.
    pub fn jacobian_project_dir(&self, dir: &Vec3) -> DirJacobian {
        let half = self.half_fov();
        let (u, v, w) = (dir.x, dir.y, dir.z);
        let rho2 = u * u + v * v;
        let rho = rho2.sqrt();

        let mut jac = DirJacobian::zeros();
        if rho < AXIS_EPS {
            // Small-angle limit: p ~ (u, v) / (half * w).
            let s = 1.0 / (half * w);
            jac[(0, 0)] = s;
            jac[(0, 2)] = -u * s / w;
            jac[(1, 1)] = s;
            jac[(1, 2)] = -v * s / w;
            return jac;
        }

        let n2 = rho2 + w * w;
        let theta = rho.atan2(w);
        let alpha = theta / (half * rho);

        // d theta / d dir and d rho / d dir.
        let dtheta = [u * w / (n2 * rho), v * w / (n2 * rho), -rho / n2];
        let drho = [u / rho, v / rho, 0.0];

        for col in 0..3 {
            let dalpha = (dtheta[col] * rho - theta * drho[col]) / (half * rho2);
            jac[(0, col)] = u * dalpha;
            jac[(1, col)] = v * dalpha;
        }
        jac[(0, 0)] += alpha;
        jac[(1, 1)] += alpha;
        jac
    }

    /// Jacobian of [`Self::to_unit_sphere`] with respect to the
    /// normalized point.
    pub fn jacobian_to_unit_sphere_point(&self, p: &Vec2) -> SphereJacobian {
        let half = self.half_fov();
        let rho = p.norm();

        let mut jac = SphereJacobian::zeros();
        if rho < AXIS_EPS {
            jac[(0, 0)] = half;
            jac[(1, 1)] = half;
            return jac;
        }

        let theta = rho * half;
        let (sin_t, cos_t) = theta.sin_cos();
        let c = sin_t / rho;

        for col in 0..2 {
            let dc = p[col] * (half * cos_t * rho - sin_t) / (rho * rho * rho);
            jac[(0, col)] = p.x * dc;
            jac[(1, col)] = p.y * dc;
            jac[(2, col)] = -half * sin_t * p[col] / rho;
        }
        jac[(0, 0)] += c;
        jac[(1, 1)] += c;
        jac
    }

    /// Jacobian of [`Self::world_to_image`] (with distortion) with
    /// respect to the direction.
    pub fn jacobian_world_to_image_dir(&self, dir: &Vec3) -> DirJacobian {
        let p = self.project_dir(dir);
        self.disto.jacobian_point(&p) * self.jacobian_project_dir(dir) * self.radius
    }

    /// Jacobian of [`Self::world_to_image`] (with distortion) with
    /// respect to the distortion coefficients.
    pub fn jacobian_world_to_image_disto(&self, dir: &Vec3) -> SMatrix<Real, 2, 3> {
        let p = self.project_dir(dir);
        self.disto.jacobian_coeffs(&p) * self.radius
    }

    /// Jacobian of [`Self::world_to_image`] with respect to the
    /// principal point.
    pub fn jacobian_world_to_image_pp(&self) -> Matrix2<Real> {
        Matrix2::identity()
    }

    /// Jacobian of [`Self::image_to_cam`] with respect to the principal
    /// point.
    pub fn jacobian_image_to_cam_pp(&self) -> Matrix2<Real> {
        Matrix2::identity() * (-1.0 / self.radius)
    }
}
