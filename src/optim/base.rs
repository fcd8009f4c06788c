//! Base nonlinear solver trait and types

use nalgebra::{DMatrix, DVector, Dyn};
use nalgebra::linalg::FullPivLU;
use rksim_types::NonlinearSettings;
use thiserror::Error;

/// Smallest admissible ratio between the extreme pivots of an LU factorization
pub const PIVOT_RATIO_MIN: f64 = 1e-14;

/// Nonlinear solver errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NonlinearError {
    #[error("Singular Jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },

    #[error("Solver did not converge after {0} iterations")]
    MaxIterations(usize),

    #[error("Function evaluation budget of {0} exhausted")]
    MaxFunctionEvaluations(usize),

    #[error("Jacobian evaluation budget of {0} exhausted")]
    MaxJacobianEvaluations(usize),

    #[error("Non-finite residual at iteration {iteration}")]
    NonFinite { iteration: usize },
}

/// Diagnostics of the last solve
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolverStats {
    pub iterations: usize,
    pub function_evaluations: usize,
    pub jacobian_evaluations: usize,
    pub relaxations: usize,
    pub residual_norm: f64,
    pub converged: bool,
}

impl SolverStats {
    /// Accumulate evaluation counters from another solve
    pub fn absorb(&mut self, other: &SolverStats) {
        self.iterations += other.iterations;
        self.function_evaluations += other.function_evaluations;
        self.jacobian_evaluations += other.jacobian_evaluations;
        self.relaxations += other.relaxations;
        self.residual_norm = other.residual_norm;
        self.converged = other.converged;
    }
}

/// Solver for `g(y) = 0`
pub trait NonlinearSolver {
    /// Solve from the initial guess `y0`
    ///
    /// # Arguments
    /// * `residual` - Residual evaluator `g(y)`
    /// * `jacobian` - Jacobian evaluator `dg/dy(y)`
    /// * `y0` - Initial guess
    fn solve<F, J>(
        &mut self,
        residual: F,
        jacobian: J,
        y0: DVector<f64>,
    ) -> Result<DVector<f64>, NonlinearError>
    where
        F: FnMut(&DVector<f64>) -> DVector<f64>,
        J: FnMut(&DVector<f64>) -> DMatrix<f64>;

    /// Diagnostics of the last call to [`NonlinearSolver::solve`]
    fn stats(&self) -> &SolverStats;

    fn settings(&self) -> &NonlinearSettings;

    fn name(&self) -> &'static str;
}

/// Dense LU factorization with a conditioning guard
#[derive(Debug, Clone)]
pub struct DenseLu {
    lu: FullPivLU<f64, Dyn, Dyn>,
}

impl DenseLu {
    /// Factorize a square matrix, rejecting it when the pivots are degenerate
    pub fn new(matrix: DMatrix<f64>) -> Option<Self> {
        if !matrix.is_square() || matrix.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let lu = matrix.full_piv_lu();
        let pivots = lu.u().diagonal().map(f64::abs);
        if pivots.is_empty() {
            return Some(Self { lu });
        }
        let (min, max) = (pivots.min(), pivots.max());
        if max == 0.0 || min / max < PIVOT_RATIO_MIN {
            return None;
        }
        Some(Self { lu })
    }

    pub fn solve(&self, rhs: &DVector<f64>) -> Option<DVector<f64>> {
        self.lu
            .solve(rhs)
            .filter(|x| x.iter().all(|v| v.is_finite()))
    }

    /// Solve for every column of `rhs`
    pub fn solve_matrix(&self, rhs: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        self.lu
            .solve(rhs)
            .filter(|x| x.iter().all(|v| v.is_finite()))
    }

    pub fn inverse(&self) -> Option<DMatrix<f64>> {
        self.lu.try_inverse()
    }
}

pub(crate) fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}
