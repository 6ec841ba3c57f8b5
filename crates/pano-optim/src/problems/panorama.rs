//! Rotation-only panorama refinement.
//!
//! Views share no translation; each view is a camera plus a rotation
//! from the rig frame. Every match in the correspondence graph
//! contributes two directed reprojection residuals. Rotations are
//! optimized on the SO(3) tangent around base values captured at build
//! time; intrinsics are optimized per scalar under a fixing policy.

use anyhow::{bail, ensure, Result};
use log::debug;
use nalgebra::{DMatrix, DVector};
use pano_core::{
    left_jacobian, local_jacobian, CorrespondenceGraph, EquidistantFisheye, Mat3, Real, Vec3,
};

use crate::factors::{PairReprojectionFactor, Slot};
use crate::params::{FixedMask, IntrinsicBlocks, RotationBlock, DISTO_DIM, FOV_DIM, PP_DIM};
use crate::{LmBackend, NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};

/// Initial state of the rig: one camera and one rig-to-view rotation
/// per view.
#[derive(Debug, Clone)]
pub struct PanoramaViews {
    pub cameras: Vec<EquidistantFisheye>,
    pub rotations: Vec<Mat3>,
}

impl PanoramaViews {
    pub fn new(cameras: Vec<EquidistantFisheye>, rotations: Vec<Mat3>) -> Result<Self> {
        ensure!(
            cameras.len() == rotations.len(),
            "{} cameras but {} rotations",
            cameras.len(),
            rotations.len()
        );
        ensure!(cameras.len() >= 2, "a panorama needs at least two views");
        for (idx, r) in rotations.iter().enumerate() {
            let defect = (r.transpose() * r - Mat3::identity()).norm();
            ensure!(
                defect < 1e-6 && (r.determinant() - 1.0).abs() < 1e-6,
                "rotation of view {idx} is not orthonormal (defect {defect:.3e})"
            );
        }
        Ok(Self { cameras, rotations })
    }

    pub fn num_views(&self) -> usize {
        self.cameras.len()
    }
}

/// Per-view fixing policy. Masks address scalars inside each intrinsic
/// block; the rotation is fixed or free as a whole.
#[derive(Debug, Clone)]
pub struct ViewParamPolicy {
    pub fov: FixedMask,
    pub pp: FixedMask,
    pub disto: FixedMask,
    pub fix_rotation: bool,
}

impl ViewParamPolicy {
    /// Reference policy: distortion and rotation free, field of view and
    /// principal point fixed.
    pub fn reference() -> Self {
        Self {
            fov: FixedMask::all_fixed(FOV_DIM),
            pp: FixedMask::all_fixed(PP_DIM),
            disto: FixedMask::all_free(DISTO_DIM),
            fix_rotation: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanoramaParamPolicy {
    pub views: Vec<ViewParamPolicy>,
}

impl PanoramaParamPolicy {
    /// The reference policy replicated over all views.
    pub fn reference(num_views: usize) -> Self {
        Self {
            views: (0..num_views).map(|_| ViewParamPolicy::reference()).collect(),
        }
    }

    /// Keep every rotation at its initial value.
    pub fn fix_all_rotations(mut self) -> Self {
        for view in &mut self.views {
            view.fix_rotation = true;
        }
        self
    }

    /// Keep every intrinsic scalar at its initial value.
    pub fn fix_all_intrinsics(mut self) -> Self {
        for view in &mut self.views {
            view.fov = FixedMask::all_fixed(FOV_DIM);
            view.pp = FixedMask::all_fixed(PP_DIM);
            view.disto = FixedMask::all_fixed(DISTO_DIM);
        }
        self
    }
}

/// Column assignment of one view in the dense parameter vector.
#[derive(Debug, Clone, Copy, Default)]
struct ViewLayout {
    /// First of three tangent columns, when the rotation is free.
    rot: Option<usize>,
    /// One column per free intrinsic scalar, in the order
    /// `[fov, cx, cy, k1, k2, k3]`.
    intrinsics: [Option<usize>; 6],
}

#[derive(Debug)]
struct DirectedFactor {
    source: usize,
    target: usize,
    factor: PairReprojectionFactor,
}

/// Dense panorama problem ready for a [`NllsSolverBackend`].
#[derive(Debug)]
pub struct PanoramaProblem {
    cameras: Vec<IntrinsicBlocks>,
    /// Sensor geometry carriers; optimizable scalars are overwritten
    /// from the parameter vector at every evaluation.
    templates: Vec<EquidistantFisheye>,
    rotations: Vec<RotationBlock>,
    factors: Vec<DirectedFactor>,
    layout: Vec<ViewLayout>,
    num_cols: usize,
}

/// Assemble the dense problem, validating the policy against what the
/// factor can differentiate.
///
/// Freeing a field-of-view scalar is rejected here: the reprojection
/// factor declares no analytic Jacobian for those slots, and a free
/// parameter without a Jacobian would silently never move.
pub fn build_panorama_problem(
    views: &PanoramaViews,
    graph: &CorrespondenceGraph,
    policy: &PanoramaParamPolicy,
) -> Result<PanoramaProblem> {
    let num_views = views.num_views();
    ensure!(
        graph.num_views() == num_views,
        "correspondence graph has {} views, rig has {}",
        graph.num_views(),
        num_views
    );
    ensure!(
        policy.views.len() == num_views,
        "policy covers {} views, rig has {}",
        policy.views.len(),
        num_views
    );

    let mut factors = Vec::new();
    let mut touched = vec![false; num_views];
    for pair in &graph.pairs {
        ensure!(
            pair.view_i < num_views && pair.view_j < num_views && pair.view_i != pair.view_j,
            "invalid view pair ({}, {})",
            pair.view_i,
            pair.view_j
        );
        for m in &pair.matches {
            ensure!(
                m.i < graph.features[pair.view_i].len()
                    && m.j < graph.features[pair.view_j].len(),
                "match ({}, {}) out of range for pair ({}, {})",
                m.i,
                m.j,
                pair.view_i,
                pair.view_j
            );
            let pix_i = graph.features[pair.view_i][m.i];
            let pix_j = graph.features[pair.view_j][m.j];
            // One residual per viewing direction of the match.
            factors.push(DirectedFactor {
                source: pair.view_i,
                target: pair.view_j,
                factor: PairReprojectionFactor::new(pix_i, pix_j, 1.0),
            });
            factors.push(DirectedFactor {
                source: pair.view_j,
                target: pair.view_i,
                factor: PairReprojectionFactor::new(pix_j, pix_i, 1.0),
            });
            touched[pair.view_i] = true;
            touched[pair.view_j] = true;
        }
    }
    ensure!(!factors.is_empty(), "correspondence graph has no matches");

    let implemented = PairReprojectionFactor::IMPLEMENTED_SLOTS;
    let mut layout = vec![ViewLayout::default(); num_views];
    let mut num_cols = 0usize;
    for (v, view_policy) in policy.views.iter().enumerate() {
        let any_free = !view_policy.fix_rotation
            || !view_policy.fov.is_all_fixed()
            || !view_policy.pp.is_all_fixed()
            || !view_policy.disto.is_all_fixed();
        if any_free {
            ensure!(
                touched[v],
                "view {v} has free parameters but no residual supplies their Jacobian"
            );
        }

        if !view_policy.fov.is_all_fixed() {
            // Both fov slots are unimplemented; source suffices for the check.
            if !implemented[Slot::FovSource as usize] {
                bail!(
                    "view {v}: field of view is free but the reprojection factor \
                     has no analytic Jacobian for it"
                );
            }
        }

        if !view_policy.fix_rotation {
            layout[v].rot = Some(num_cols);
            num_cols += 3;
        }
        let masks = [&view_policy.fov, &view_policy.pp, &view_policy.disto];
        let mut scalar = 0usize;
        for mask in masks {
            for local in 0..mask.dim() {
                if !mask.is_fixed(local) {
                    layout[v].intrinsics[scalar] = Some(num_cols);
                    num_cols += 1;
                }
                scalar += 1;
            }
        }
    }
    ensure!(num_cols > 0, "policy fixes every parameter, nothing to solve");

    debug!(
        "panorama problem: {} views, {} matches, {} residual rows, {} free columns",
        num_views,
        graph.num_matches(),
        2 * factors.len(),
        num_cols
    );

    Ok(PanoramaProblem {
        cameras: views.cameras.iter().map(IntrinsicBlocks::from_camera).collect(),
        templates: views.cameras.clone(),
        rotations: views.rotations.iter().map(|r| RotationBlock::new(*r)).collect(),
        factors,
        layout,
        num_cols,
    })
}

impl PanoramaProblem {
    /// Initial parameter vector: zero rotation tangents, base values for
    /// free intrinsic scalars.
    pub fn initial_params(&self) -> DVector<Real> {
        let mut x = DVector::zeros(self.num_cols);
        for (v, layout) in self.layout.iter().enumerate() {
            for (scalar, col) in layout.intrinsics.iter().enumerate() {
                if let Some(col) = *col {
                    x[col] = self.cameras[v].scalar(scalar);
                }
            }
        }
        x
    }

    /// Cameras and rotations at the given parameter vector. Rotations
    /// come back orthonormal for any tangent value.
    pub fn materialize(&self, x: &DVector<Real>) -> (Vec<EquidistantFisheye>, Vec<Mat3>) {
        let mut cameras = Vec::with_capacity(self.templates.len());
        let mut rotations = Vec::with_capacity(self.templates.len());
        for (v, layout) in self.layout.iter().enumerate() {
            let mut blocks = self.cameras[v];
            for (scalar, col) in layout.intrinsics.iter().enumerate() {
                if let Some(col) = *col {
                    blocks.set_scalar(scalar, x[col]);
                }
            }
            let mut cam = self.templates[v];
            blocks.apply_to(&mut cam);
            cameras.push(cam);
            rotations.push(self.rotations[v].value(&self.rotation_tangent(layout, x)));
        }
        (cameras, rotations)
    }

    fn rotation_tangent(&self, layout: &ViewLayout, x: &DVector<Real>) -> Vec3 {
        match layout.rot {
            Some(c0) => Vec3::new(x[c0], x[c0 + 1], x[c0 + 2]),
            None => Vec3::zeros(),
        }
    }
}

impl NllsProblem for PanoramaProblem {
    fn num_params(&self) -> usize {
        self.num_cols
    }

    fn num_residuals(&self) -> usize {
        2 * self.factors.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let (cameras, rotations) = self.materialize(x);
        let mut r = DVector::zeros(self.num_residuals());
        for (idx, df) in self.factors.iter().enumerate() {
            let res = df.factor.residual(
                &cameras[df.source],
                &cameras[df.target],
                &rotations[df.source],
                &rotations[df.target],
            );
            r[2 * idx] = res.x;
            r[2 * idx + 1] = res.y;
        }
        r
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let (cameras, rotations) = self.materialize(x);

        // Embedding-to-tangent map per view. Away from the base point
        // the additive tangent step differs from the left-composed
        // increment by the SO(3) left Jacobian.
        let tangent_maps: Vec<_> = self
            .layout
            .iter()
            .map(|layout| local_jacobian() * left_jacobian(&self.rotation_tangent(layout, x)))
            .collect();

        let mut jac = DMatrix::zeros(self.num_residuals(), self.num_cols);
        for (idx, df) in self.factors.iter().enumerate() {
            let row = 2 * idx;
            let (_, slots) = df.factor.evaluate(
                &cameras[df.source],
                &cameras[df.target],
                &rotations[df.source],
                &rotations[df.target],
            );

            if let Some(c0) = self.layout[df.source].rot {
                let t = slots.rot_source * tangent_maps[df.source];
                for k in 0..3 {
                    jac[(row, c0 + k)] += t[(0, k)];
                    jac[(row + 1, c0 + k)] += t[(1, k)];
                }
            }
            if let Some(c0) = self.layout[df.target].rot {
                let t = slots.rot_target * tangent_maps[df.target];
                for k in 0..3 {
                    jac[(row, c0 + k)] += t[(0, k)];
                    jac[(row + 1, c0 + k)] += t[(1, k)];
                }
            }

            // Intrinsic scalar columns: [fov, cx, cy, k1, k2, k3].
            for local in 0..PP_DIM {
                if let Some(col) = self.layout[df.source].intrinsics[FOV_DIM + local] {
                    jac[(row, col)] += slots.pp_source[(0, local)];
                    jac[(row + 1, col)] += slots.pp_source[(1, local)];
                }
                if let Some(col) = self.layout[df.target].intrinsics[FOV_DIM + local] {
                    jac[(row, col)] += slots.pp_target[(0, local)];
                    jac[(row + 1, col)] += slots.pp_target[(1, local)];
                }
            }
            for local in 0..DISTO_DIM {
                if let Some(col) =
                    self.layout[df.source].intrinsics[FOV_DIM + PP_DIM + local]
                {
                    jac[(row, col)] += slots.disto_source[(0, local)];
                    jac[(row + 1, col)] += slots.disto_source[(1, local)];
                }
                if let Some(col) =
                    self.layout[df.target].intrinsics[FOV_DIM + PP_DIM + local]
                {
                    jac[(row, col)] += slots.disto_target[(0, local)];
                    jac[(row + 1, col)] += slots.disto_target[(1, local)];
                }
            }
        }
        jac
    }
}

/// Refined rig returned by [`solve_panorama`].
#[derive(Debug, Clone)]
pub struct PanoramaResult {
    pub cameras: Vec<EquidistantFisheye>,
    pub rotations: Vec<Mat3>,
    pub report: SolveReport,
}

/// Build the problem and run the Levenberg-Marquardt backend.
pub fn solve_panorama(
    views: &PanoramaViews,
    graph: &CorrespondenceGraph,
    policy: &PanoramaParamPolicy,
    opts: &SolveOptions,
) -> Result<PanoramaResult> {
    let problem = build_panorama_problem(views, graph, policy)?;
    let x0 = problem.initial_params();
    let (x_opt, report) = LmBackend.solve(&problem, x0, opts);
    let (cameras, rotations) = problem.materialize(&x_opt);
    debug!(
        "panorama solve: converged={} cost={:.6e} after {} evaluations",
        report.converged, report.final_cost, report.iterations
    );
    Ok(PanoramaResult {
        cameras,
        rotations,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::synthetic::{project_views, rotations_about_y, sphere_grid};
    use std::f64::consts::PI;

    fn camera(k1: Real) -> EquidistantFisheye {
        EquidistantFisheye::new(
            3840.0, 5760.0,
            176.0 * PI / 180.0,
            1952.0, 2824.0,
            1980.0,
            k1, 0.0, 0.0,
        )
    }

    fn rig(k1: Real, n: usize) -> PanoramaViews {
        PanoramaViews::new(vec![camera(k1); n], rotations_about_y(n, 0.5 * PI)).unwrap()
    }

    fn graph(n: usize) -> CorrespondenceGraph {
        let truth = rig(0.004, n);
        project_views(&truth.cameras, &truth.rotations, &sphere_grid(10.0))
    }

    #[test]
    fn builder_emits_two_residuals_per_match() {
        let graph = graph(3);
        let problem =
            build_panorama_problem(&rig(0.004, 3), &graph, &PanoramaParamPolicy::reference(3))
                .unwrap();
        assert_eq!(problem.num_residuals(), 4 * graph.num_matches());
        // Three free rotations and three free distortion triples.
        assert_eq!(problem.num_params(), 3 * 3 + 3 * 3);
    }

    #[test]
    fn builder_rejects_free_fov() {
        let mut policy = PanoramaParamPolicy::reference(3);
        policy.views[1].fov = FixedMask::all_free(FOV_DIM);
        let err = build_panorama_problem(&rig(0.004, 3), &graph(3), &policy).unwrap_err();
        assert!(err.to_string().contains("field of view"), "{err}");
    }

    #[test]
    fn builder_rejects_view_count_mismatch() {
        assert!(
            build_panorama_problem(&rig(0.004, 2), &graph(3), &PanoramaParamPolicy::reference(2))
                .is_err()
        );
        assert!(
            build_panorama_problem(&rig(0.004, 3), &graph(3), &PanoramaParamPolicy::reference(2))
                .is_err()
        );
    }

    #[test]
    fn builder_rejects_fully_fixed_problem() {
        let policy = PanoramaParamPolicy::reference(3)
            .fix_all_rotations()
            .fix_all_intrinsics();
        assert!(build_panorama_problem(&rig(0.004, 3), &graph(3), &policy).is_err());
    }

    #[test]
    fn initial_params_carry_base_intrinsics_and_zero_tangents() {
        let problem =
            build_panorama_problem(&rig(0.004, 3), &graph(3), &PanoramaParamPolicy::reference(3))
                .unwrap();
        let x0 = problem.initial_params();
        let (cameras, rotations) = problem.materialize(&x0);
        let truth = rig(0.004, 3);
        for v in 0..3 {
            assert_eq!(cameras[v], truth.cameras[v]);
            assert!((rotations[v] - truth.rotations[v]).norm() < 1e-15);
        }
    }

    #[test]
    fn residuals_vanish_at_ground_truth() {
        let problem =
            build_panorama_problem(&rig(0.004, 3), &graph(3), &PanoramaParamPolicy::reference(3))
                .unwrap();
        let r = problem.residuals(&problem.initial_params());
        assert!(r.norm() < 1e-6, "residual norm at truth: {}", r.norm());
    }

    #[test]
    fn dense_jacobian_matches_finite_differences() {
        // Evaluate away from the optimum and with nonzero tangents so
        // the left-Jacobian correction is exercised.
        let problem =
            build_panorama_problem(&rig(0.002, 3), &graph(3), &PanoramaParamPolicy::reference(3))
                .unwrap();
        let mut x = problem.initial_params();
        for (idx, value) in x.iter_mut().enumerate() {
            *value += 0.005 * ((idx % 5) as Real - 2.0);
        }

        let jac = problem.jacobian(&x);
        let eps = 1e-6;
        for col in 0..problem.num_params() {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[col] += eps;
            minus[col] -= eps;
            let num = (problem.residuals(&plus) - problem.residuals(&minus)) / (2.0 * eps);
            let ana = jac.column(col);
            let diff = (&num - &ana).amax();
            assert!(
                diff < 1e-2,
                "column {col} differs from finite differences by {diff}"
            );
        }
    }
}
