//! Concrete optimization problems built from factors.

mod panorama;

pub use panorama::{
    build_panorama_problem, solve_panorama, PanoramaParamPolicy, PanoramaProblem, PanoramaResult,
    PanoramaViews, ViewParamPolicy,
};
