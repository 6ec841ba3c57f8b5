//! End-to-end panorama refinement on synthetic rigs.
//!
//! Ground truth is generated by projecting a sphere grid through known
//! cameras and rotations; the initial state is then perturbed and the
//! solver must drive the reprojection error back to zero.

use std::f64::consts::PI;

use pano_core::synthetic::{project_views, rotations_about_y, sphere_grid};
use pano_core::{log_so3, retract, CorrespondenceGraph, EquidistantFisheye, Real, Vec3};
use pano_optim::{
    solve_panorama, PanoramaParamPolicy, PanoramaViews, SolveOptions,
};

const TRUE_K1: Real = 0.004;

fn camera(k1: Real) -> EquidistantFisheye {
    EquidistantFisheye::new(
        3840.0,
        5760.0,
        176.0 * PI / 180.0,
        1952.0,
        2824.0,
        1980.0,
        k1,
        0.0,
        0.0,
    )
}

/// Three views a quarter turn apart about +Y, sharing one physical lens.
fn ground_truth() -> PanoramaViews {
    PanoramaViews::new(vec![camera(TRUE_K1); 3], rotations_about_y(3, 0.5 * PI)).unwrap()
}

fn observations(truth: &PanoramaViews) -> CorrespondenceGraph {
    project_views(&truth.cameras, &truth.rotations, &sphere_grid(5.0))
}

#[test]
fn recovers_distortion_from_zeroed_initial_guess() {
    let truth = ground_truth();
    let graph = observations(&truth);

    // Distortion zeroed out; rotations kept at truth and fixed along
    // with fov and pp, so only the three k-triples move.
    let initial =
        PanoramaViews::new(vec![camera(0.0); 3], truth.rotations.clone()).unwrap();
    let policy = PanoramaParamPolicy::reference(3).fix_all_rotations();

    let result = solve_panorama(&initial, &graph, &policy, &SolveOptions::default()).unwrap();

    assert!(result.report.converged, "report: {:?}", result.report);
    assert!(
        result.report.final_cost < 1e-10,
        "final cost {:.3e}",
        result.report.final_cost
    );
    for cam in &result.cameras {
        assert!(
            (cam.disto.k1 - TRUE_K1).abs() < 1e-6,
            "k1 = {}, want {TRUE_K1}",
            cam.disto.k1
        );
        assert!(cam.disto.k2.abs() < 1e-6);
        assert!(cam.disto.k3.abs() < 1e-6);
    }
}

#[test]
fn recovers_perturbed_rotations_with_fixed_intrinsics() {
    let truth = ground_truth();
    let graph = observations(&truth);

    // Tilt views 1 and 2 off their true orientations; view 0 stays at
    // truth and fixed to pin the gauge freedom.
    let mut rotations = truth.rotations.clone();
    rotations[1] = retract(&rotations[1], &Vec3::new(0.002, -0.001, 0.0015));
    rotations[2] = retract(&rotations[2], &Vec3::new(-0.001, 0.002, -0.002));
    let initial = PanoramaViews::new(truth.cameras.clone(), rotations).unwrap();

    let mut policy = PanoramaParamPolicy::reference(3).fix_all_intrinsics();
    policy.views[0].fix_rotation = true;

    let result = solve_panorama(&initial, &graph, &policy, &SolveOptions::default()).unwrap();

    assert!(result.report.converged, "report: {:?}", result.report);
    for (recovered, want) in result.rotations.iter().zip(truth.rotations.iter()) {
        let angle = log_so3(&(recovered * want.transpose())).norm();
        assert!(angle < 1e-7, "residual rotation angle {angle:.3e} rad");
    }
}

#[test]
fn fixed_scalars_keep_their_initial_values() {
    let truth = ground_truth();
    let graph = observations(&truth);

    // k1 free, k2/k3 pinned at a deliberately wrong value; the solve
    // must leave them untouched.
    let mut start = camera(0.0);
    start.disto.k3 = 0.0001;
    let initial = PanoramaViews::new(vec![start; 3], truth.rotations.clone()).unwrap();

    let mut policy = PanoramaParamPolicy::reference(3).fix_all_rotations();
    for view in &mut policy.views {
        view.disto = view.disto.clone().fix_indices(&[1, 2]);
    }

    let result = solve_panorama(&initial, &graph, &policy, &SolveOptions::default()).unwrap();

    for cam in &result.cameras {
        assert_eq!(cam.disto.k3, 0.0001, "fixed k3 moved");
        assert_eq!(cam.disto.k2, 0.0, "fixed k2 moved");
        assert!((cam.pp.x - 1952.0).abs() < 1e-12, "fixed pp moved");
        assert!((cam.fov - 176.0 * PI / 180.0).abs() < 1e-12, "fixed fov moved");
    }
    for (recovered, want) in result.rotations.iter().zip(truth.rotations.iter()) {
        assert!((recovered - want).norm() < 1e-12, "fixed rotation moved");
    }
}

#[test]
fn freeing_the_fov_is_rejected_up_front() {
    let truth = ground_truth();
    let graph = observations(&truth);

    let mut policy = PanoramaParamPolicy::reference(3);
    policy.views[2].fov = pano_optim::FixedMask::all_free(1);

    let err = solve_panorama(&truth, &graph, &policy, &SolveOptions::default()).unwrap_err();
    assert!(
        err.to_string().contains("field of view"),
        "unexpected error: {err}"
    );
}
