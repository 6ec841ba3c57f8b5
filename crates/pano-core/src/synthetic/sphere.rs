//! Sphere-sampling harness.
//!
//! Samples a latitude/longitude grid of unit directions, projects each
//! direction into every view, and intersects the surviving sample ids
//! per view pair to build a [`CorrespondenceGraph`]. A sample that is
//! invisible in either view of a pair is silently dropped.

use std::collections::BTreeMap;

use nalgebra::Rotation3;

use crate::correspondence::{CorrespondenceGraph, IndexMatch, PairMatches};
use crate::math::{Mat3, Real, Vec3};
use crate::models::EquidistantFisheye;

/// Unit directions on a latitude/longitude grid with the given angular
/// step in degrees. Deterministic order: latitude major, from the south
/// pole up, longitude `[0, 360)`. Each pole is sampled exactly once;
/// every longitude collapses to the same direction there, and repeated
/// pole samples would duplicate features (and residuals) in any view
/// that sees a pole.
pub fn sphere_grid(step_deg: Real) -> Vec<Vec3> {
    assert!(step_deg > 0.0, "grid step must be positive");
    let n_lat = (180.0 / step_deg).round() as i64;
    let n_lon = (360.0 / step_deg).round() as i64;

    let mut points = Vec::with_capacity(((n_lat - 1) * n_lon + 2) as usize);
    for ilat in 0..=n_lat {
        let lat = (-90.0 + ilat as Real * step_deg).to_radians();
        if ilat == 0 || ilat == n_lat {
            points.push(Vec3::new(0.0, lat.signum(), 0.0));
            continue;
        }
        for ilon in 0..n_lon {
            let lon = (ilon as Real * step_deg).to_radians();
            points.push(Vec3::new(
                lat.cos() * lon.sin(),
                lat.sin(),
                lat.cos() * lon.cos(),
            ));
        }
    }
    points
}

/// `n` rotations about the +Y axis: `step_rad * view_index`.
pub fn rotations_about_y(n: usize, step_rad: Real) -> Vec<Mat3> {
    (0..n)
        .map(|idx| *Rotation3::new(Vec3::new(0.0, step_rad * idx as Real, 0.0)).matrix())
        .collect()
}

/// Project sample directions into every view and intersect visible
/// sample ids per view pair.
///
/// A sample survives in a view only when both visibility predicates
/// pass: the rotated ray is inside the angular field of view and the
/// projected pixel is inside the sensor. Feature ids are dense per view
/// in sample order.
///
/// # Panics
///
/// Panics when `cameras` and `rotations` lengths differ.
pub fn project_views(
    cameras: &[EquidistantFisheye],
    rotations: &[Mat3],
    points: &[Vec3],
) -> CorrespondenceGraph {
    assert_eq!(
        cameras.len(),
        rotations.len(),
        "one rotation per camera required"
    );

    let mut features = Vec::with_capacity(cameras.len());
    // sample id -> feature id, per view; BTreeMap keeps match order stable.
    let mut projected: Vec<BTreeMap<usize, usize>> = Vec::with_capacity(cameras.len());

    for (cam, rot) in cameras.iter().zip(rotations.iter()) {
        let mut view_features = Vec::new();
        let mut view_map = BTreeMap::new();

        for (sample_id, point) in points.iter().enumerate() {
            let ray = rot * point;
            if !cam.is_visible_ray(&ray) {
                continue;
            }
            let pixel = cam.world_to_image(&ray, true);
            if !cam.is_visible(&pixel) {
                continue;
            }
            view_map.insert(sample_id, view_features.len());
            view_features.push(pixel);
        }

        features.push(view_features);
        projected.push(view_map);
    }

    let mut pairs = Vec::new();
    for view_i in 0..projected.len() {
        for view_j in (view_i + 1)..projected.len() {
            let mut matches = Vec::new();
            for (sample_id, &feat_i) in &projected[view_i] {
                if let Some(&feat_j) = projected[view_j].get(sample_id) {
                    matches.push(IndexMatch {
                        i: feat_i,
                        j: feat_j,
                    });
                }
            }
            pairs.push(PairMatches {
                view_i,
                view_j,
                matches,
            });
        }
    }

    CorrespondenceGraph { features, pairs }
}
