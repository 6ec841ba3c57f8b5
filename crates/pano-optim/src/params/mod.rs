//! Parameter blocks and per-scalar fixing masks.

mod intrinsics;
mod rotation;

use std::collections::HashSet;

pub use intrinsics::{IntrinsicBlocks, DISTO_DIM, FOV_DIM, PP_DIM};
pub use rotation::RotationBlock;

/// Set of fixed scalar indices inside one parameter block.
///
/// Scalars not present in the mask are free and receive a column in the
/// dense Jacobian; fixed scalars keep their initial value through the
/// solve.
#[derive(Debug, Clone, Default)]
pub struct FixedMask {
    fixed: HashSet<usize>,
    dim: usize,
}

impl FixedMask {
    pub fn all_free(dim: usize) -> Self {
        Self {
            fixed: HashSet::new(),
            dim,
        }
    }

    pub fn all_fixed(dim: usize) -> Self {
        Self {
            fixed: (0..dim).collect(),
            dim,
        }
    }

    /// Fix the listed scalar indices; out-of-range indices panic.
    pub fn fix_indices(mut self, indices: &[usize]) -> Self {
        for &idx in indices {
            assert!(idx < self.dim, "scalar index {idx} out of range {}", self.dim);
            self.fixed.insert(idx);
        }
        self
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed.contains(&idx)
    }

    pub fn is_all_fixed(&self) -> bool {
        self.fixed.len() == self.dim
    }

    pub fn num_free(&self) -> usize {
        self.dim - self.fixed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::FixedMask;

    #[test]
    fn mask_counts_free_scalars() {
        let mask = FixedMask::all_free(3).fix_indices(&[1]);
        assert_eq!(mask.num_free(), 2);
        assert!(mask.is_fixed(1));
        assert!(!mask.is_fixed(0));
        assert!(!mask.is_all_fixed());
        assert!(FixedMask::all_fixed(2).is_all_fixed());
    }

    #[test]
    #[should_panic]
    fn mask_rejects_out_of_range_index() {
        let _ = FixedMask::all_free(2).fix_indices(&[2]);
    }
}
