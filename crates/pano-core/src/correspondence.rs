//! Cross-view point correspondences.
//!
//! A correspondence links a feature index in one view with a feature
//! index in another view; both are known projections of the same 3D
//! direction. Matches are stored per unordered view pair, keyed by the
//! ordered pair `(view_i, view_j)` with `view_i < view_j`; the
//! optimization layer emits one residual per viewing direction.

use anyhow::{ensure, Result};

use crate::math::Vec2;

/// Feature-index pair for one view pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMatch {
    /// Feature index in the first view of the pair.
    pub i: usize,
    /// Feature index in the second view of the pair.
    pub j: usize,
}

/// All matches between one pair of views.
#[derive(Debug, Clone)]
pub struct PairMatches {
    pub view_i: usize,
    pub view_j: usize,
    pub matches: Vec<IndexMatch>,
}

/// Per-view 2D features plus the pairwise matches between them.
///
/// Built either synthetically (see [`crate::synthetic`]) or from an
/// external feature/match provider via [`CorrespondenceGraph::from_parts`].
/// The graph is immutable during optimization.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceGraph {
    /// `features[v][f]` is the pixel observation of feature `f` in view `v`.
    pub features: Vec<Vec<Vec2>>,
    pub pairs: Vec<PairMatches>,
}

impl CorrespondenceGraph {
    /// Assemble a graph from externally matched features, validating
    /// view and feature indices.
    pub fn from_parts(features: Vec<Vec<Vec2>>, pairs: Vec<PairMatches>) -> Result<Self> {
        let num_views = features.len();
        for pair in &pairs {
            ensure!(
                pair.view_i < num_views && pair.view_j < num_views,
                "match pair ({}, {}) references a missing view ({} views)",
                pair.view_i,
                pair.view_j,
                num_views
            );
            ensure!(
                pair.view_i != pair.view_j,
                "match pair references view {} twice",
                pair.view_i
            );
            for m in &pair.matches {
                ensure!(
                    m.i < features[pair.view_i].len(),
                    "match index {} out of range for view {} ({} features)",
                    m.i,
                    pair.view_i,
                    features[pair.view_i].len()
                );
                ensure!(
                    m.j < features[pair.view_j].len(),
                    "match index {} out of range for view {} ({} features)",
                    m.j,
                    pair.view_j,
                    features[pair.view_j].len()
                );
            }
        }
        Ok(Self { features, pairs })
    }

    pub fn num_views(&self) -> usize {
        self.features.len()
    }

    /// Total number of matches over all view pairs.
    pub fn num_matches(&self) -> usize {
        self.pairs.iter().map(|p| p.matches.len()).sum()
    }
}
