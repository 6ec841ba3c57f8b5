use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use pano_core::Real;

use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};

/// Bridges a dense [`NllsProblem`] to the `levenberg-marquardt` crate,
/// which owns the parameter vector between `set_params` calls.
struct DenseAdapter<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
}

impl<'a, P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for DenseAdapter<'a, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Trust-region Levenberg-Marquardt backend over the
/// `levenberg-marquardt` crate.
#[derive(Debug, Default, Clone)]
pub struct LmBackend;

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let adapter = DenseAdapter {
            problem,
            params: x0,
        };

        let (adapter, report) = lm.minimize(adapter);
        let x_opt = adapter.params();

        if opts.verbose {
            debug!(
                "LM terminated after {} evaluations, cost {:.6e}, termination {:?}",
                report.number_of_evaluations, report.objective_function, report.termination
            );
        }

        (
            x_opt,
            SolveReport {
                iterations: report.number_of_evaluations,
                final_cost: report.objective_function,
                converged: report.termination.was_successful(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::LmBackend;
    use crate::{NllsProblem, NllsSolverBackend, SolveOptions};
    use nalgebra::{DMatrix, DVector};
    use pano_core::Real;

    /// Fit the leading radial distortion coefficient to distorted radii:
    /// residual `r (1 + k r^2) - r_d` per sample, with `d/dk = r^3`.
    struct RadialFitProblem {
        radii: Vec<Real>,
        distorted: Vec<Real>,
    }

    impl RadialFitProblem {
        fn with_true_k(k: Real) -> Self {
            let radii: Vec<Real> = (1..=8).map(|i| 0.1 * i as Real).collect();
            let distorted = radii.iter().map(|r| r * (1.0 + k * r * r)).collect();
            Self { radii, distorted }
        }
    }

    impl NllsProblem for RadialFitProblem {
        fn num_params(&self) -> usize {
            1
        }

        fn num_residuals(&self) -> usize {
            self.radii.len()
        }

        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            let k = x[0];
            DVector::from_iterator(
                self.radii.len(),
                self.radii
                    .iter()
                    .zip(self.distorted.iter())
                    .map(|(r, rd)| r * (1.0 + k * r * r) - rd),
            )
        }

        fn jacobian(&self, _x: &DVector<Real>) -> DMatrix<Real> {
            DMatrix::from_iterator(
                self.radii.len(),
                1,
                self.radii.iter().map(|r| r * r * r),
            )
        }
    }

    #[test]
    fn lm_backend_recovers_radial_coefficient() {
        let true_k = 0.004;
        let problem = RadialFitProblem::with_true_k(true_k);
        let x0 = DVector::from_element(1, 0.0);

        let (x_opt, report) = LmBackend.solve(&problem, x0, &SolveOptions::default());

        assert!(
            (x_opt[0] - true_k).abs() < 1e-10,
            "recovered k = {}, want {true_k}",
            x_opt[0]
        );
        assert!(
            report.final_cost < 1e-15,
            "cost should vanish on noise-free samples, got {:.3e}",
            report.final_cost
        );
        assert!(report.converged, "termination not successful: {report:?}");
        assert!(report.iterations > 0);
    }

    #[test]
    fn lm_backend_respects_the_iteration_cap() {
        let problem = RadialFitProblem::with_true_k(0.004);
        let x0 = DVector::from_element(1, 0.0);
        let opts = SolveOptions {
            max_iters: 1,
            ..SolveOptions::default()
        };

        let (_, report) = LmBackend.solve(&problem, x0, &opts);
        // patience = 1 bounds evaluations at n + 1 = 2.
        assert!(report.iterations <= 2, "report: {report:?}");
    }
}
