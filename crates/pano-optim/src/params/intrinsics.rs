use pano_core::{EquidistantFisheye, RadialK3, Real, Vec2};

/// Scalar count of the field-of-view block.
pub const FOV_DIM: usize = 1;
/// Scalar count of the principal-point block.
pub const PP_DIM: usize = 2;
/// Scalar count of the radial-distortion block.
pub const DISTO_DIM: usize = 3;

/// Optimizable intrinsics of one view, split into the three blocks the
/// reprojection factor differentiates independently: field of view,
/// principal point, distortion coefficients.
///
/// The sensor geometry (image size, circle radius) is never optimized
/// and stays on the camera model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntrinsicBlocks {
    /// Full field of view in radians.
    pub fov: Real,
    /// Principal point in pixels.
    pub pp: Vec2,
    /// Radial distortion coefficients `(k1, k2, k3)`.
    pub disto: RadialK3,
}

impl IntrinsicBlocks {
    pub fn from_camera(cam: &EquidistantFisheye) -> Self {
        Self {
            fov: cam.fov,
            pp: cam.pp,
            disto: cam.disto,
        }
    }

    /// Write the blocks back onto a camera model.
    pub fn apply_to(&self, cam: &mut EquidistantFisheye) {
        cam.fov = self.fov;
        cam.pp = self.pp;
        cam.disto = self.disto;
    }

    /// Scalar at block-local index, in layout order
    /// `[fov, cx, cy, k1, k2, k3]`.
    pub fn scalar(&self, idx: usize) -> Real {
        match idx {
            0 => self.fov,
            1 => self.pp.x,
            2 => self.pp.y,
            3 => self.disto.k1,
            4 => self.disto.k2,
            5 => self.disto.k3,
            _ => panic!("intrinsic scalar index {idx} out of range"),
        }
    }

    pub fn set_scalar(&mut self, idx: usize, value: Real) {
        match idx {
            0 => self.fov = value,
            1 => self.pp.x = value,
            2 => self.pp.y = value,
            3 => self.disto.k1 = value,
            4 => self.disto.k2 = value,
            5 => self.disto.k3 = value,
            _ => panic!("intrinsic scalar index {idx} out of range"),
        }
    }
}
