use nalgebra::{Matrix2, SMatrix};
use pano_core::{EquidistantFisheye, Mat3, Real, Vec2, Vec3};

/// Number of parameter slots a pair factor differentiates over.
pub const NUM_SLOTS: usize = 8;

/// Parameter slots of a directed pair factor, in layout order.
///
/// `Source` is the view whose pixel is lifted to a viewing direction,
/// `Target` the view it is reprojected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Slot {
    RotSource = 0,
    RotTarget = 1,
    FovSource = 2,
    PpSource = 3,
    DistoSource = 4,
    FovTarget = 5,
    PpTarget = 6,
    DistoTarget = 7,
}

/// Analytic Jacobians of one directed residual, by slot.
///
/// Rotation Jacobians are taken with respect to the nine row-major
/// entries of a left-composed increment at the current rotation; the
/// problem layer maps them through `so3::local_jacobian` onto the
/// tangent space. Field-of-view slots have no analytic Jacobian (see
/// [`PairReprojectionFactor::IMPLEMENTED_SLOTS`]).
#[derive(Debug, Clone, Copy)]
pub struct PairJacobians {
    pub rot_source: SMatrix<Real, 2, 9>,
    pub rot_target: SMatrix<Real, 2, 9>,
    pub pp_source: Matrix2<Real>,
    pub disto_source: SMatrix<Real, 2, 3>,
    pub pp_target: Matrix2<Real>,
    pub disto_target: SMatrix<Real, 2, 3>,
}

/// One directed reprojection residual between two views of a rotating
/// rig.
///
/// The source pixel is undistorted and lifted to a unit direction, the
/// relative rotation `R_target * R_source^T` maps it into the target
/// view, and the full forward projection predicts a target pixel. The
/// residual is `sqrt(weight) * (predicted - observed)`. Every unordered
/// match contributes two of these, one per direction.
#[derive(Debug, Clone, Copy)]
pub struct PairReprojectionFactor {
    pub source_pixel: Vec2,
    pub target_pixel: Vec2,
    pub weight: Real,
}

impl PairReprojectionFactor {
    /// Slots with an implemented analytic Jacobian, indexed by [`Slot`].
    /// The field-of-view slots are declared but not differentiated;
    /// problem construction refuses to free them.
    pub const IMPLEMENTED_SLOTS: [bool; NUM_SLOTS] =
        [true, true, false, true, true, false, true, true];

    pub fn new(source_pixel: Vec2, target_pixel: Vec2, weight: Real) -> Self {
        Self {
            source_pixel,
            target_pixel,
            weight,
        }
    }

    /// Weighted residual at the given cameras and rig-to-view rotations.
    pub fn residual(
        &self,
        source: &EquidistantFisheye,
        target: &EquidistantFisheye,
        rot_source: &Mat3,
        rot_target: &Mat3,
    ) -> Vec2 {
        let dir_source = source
            .to_unit_sphere(&source.remove_distortion(&source.image_to_cam(&self.source_pixel)));
        let rel = rot_target * rot_source.transpose();
        let predicted = target.world_to_image(&(rel * dir_source), true);
        (predicted - self.target_pixel) * self.weight.sqrt()
    }

    /// Weighted residual plus per-slot analytic Jacobians.
    pub fn evaluate(
        &self,
        source: &EquidistantFisheye,
        target: &EquidistantFisheye,
        rot_source: &Mat3,
        rot_target: &Mat3,
    ) -> (Vec2, PairJacobians) {
        let pt_cam = source.image_to_cam(&self.source_pixel);
        let pt_undist = source.remove_distortion(&pt_cam);
        let dir_source = source.to_unit_sphere(&pt_undist);
        let rel = rot_target * rot_source.transpose();
        let dir_target = rel * dir_source;

        let sqrt_w = self.weight.sqrt();
        let residual = (target.world_to_image(&dir_target, true) - self.target_pixel) * sqrt_w;

        // d pixel / d dir in the target frame, then chained back through
        // the relative rotation and the source inverse projection.
        let j_pix_dir = target.jacobian_world_to_image_dir(&dir_target) * sqrt_w;
        let j_pix_dir_source = j_pix_dir * rel;
        let j_source_pt =
            j_pix_dir_source * source.jacobian_to_unit_sphere_point(&pt_undist);
        let j_undist_pt = source.disto.jacobian_undistort_point(&pt_cam);

        let jacobians = PairJacobians {
            rot_source: rot_source_embedding(&j_pix_dir_source, &dir_source),
            rot_target: rot_target_embedding(&j_pix_dir, &dir_target),
            pp_source: j_source_pt * j_undist_pt * source.jacobian_image_to_cam_pp(),
            disto_source: j_source_pt * source.disto.jacobian_undistort_coeffs(&pt_cam),
            pp_target: target.jacobian_world_to_image_pp() * sqrt_w,
            disto_target: target.jacobian_world_to_image_disto(&dir_target) * sqrt_w,
        };
        (residual, jacobians)
    }
}

/// Target-rotation embedding Jacobian: an increment `E` replaces the
/// relative rotation by `E * rel`, so the projected direction becomes
/// `E * dir_target` and `d (E q)_c / d E_ab = δ_ca q_b`.
fn rot_target_embedding(
    j_pix_dir: &SMatrix<Real, 2, 3>,
    dir_target: &Vec3,
) -> SMatrix<Real, 2, 9> {
    let mut jac = SMatrix::<Real, 2, 9>::zeros();
    for row in 0..2 {
        for a in 0..3 {
            for b in 0..3 {
                jac[(row, 3 * a + b)] = j_pix_dir[(row, a)] * dir_target[b];
            }
        }
    }
    jac
}

/// Source-rotation embedding Jacobian: an increment `E` on the source
/// rotation replaces the relative rotation by `rel * E^T`, so the
/// direction becomes `rel * E^T * dir_source` and
/// `d (E^T p)_c / d E_ab = δ_cb p_a`.
fn rot_source_embedding(
    j_pix_dir_source: &SMatrix<Real, 2, 3>,
    dir_source: &Vec3,
) -> SMatrix<Real, 2, 9> {
    let mut jac = SMatrix::<Real, 2, 9>::zeros();
    for row in 0..2 {
        for a in 0..3 {
            for b in 0..3 {
                jac[(row, 3 * a + b)] = j_pix_dir_source[(row, b)] * dir_source[a];
            }
        }
    }
    jac
}
