use nalgebra::{DMatrix, DVector};
use pano_core::Real;

/// Dense non-linear least squares problem.
///
/// Residual weights are the implementation's business: rows arrive at
/// the backend already scaled by `sqrt(w_i)`, so a backend minimizes a
/// plain sum of squares.
pub trait NllsProblem {
    /// Length of the parameter vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows.
    fn num_residuals(&self) -> usize;

    /// Residual vector at `x`.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    /// Dense Jacobian at `x`, `num_residuals x num_params`.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real>;
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Iteration cap. The LM backend forwards this as its patience,
    /// which bounds function evaluations at `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Stop when the relative cost reduction falls below this.
    pub ftol: Real,
    /// Stop when the gradient is this close to orthogonal to the
    /// residual vector.
    pub gtol: Real,
    /// Stop when the relative parameter step falls below this.
    pub xtol: Real,
    /// Emit a per-solve summary through the `log` facade.
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 500,
            ftol: 1e-10,
            gtol: 1e-10,
            xtol: 1e-10,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    pub iterations: usize,
    pub final_cost: Real,
    pub converged: bool,
}

pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
