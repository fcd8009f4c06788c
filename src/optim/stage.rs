//! Stage solver selection

use nalgebra::{DMatrix, DVector};
use rksim_types::{BroydenMode, NonlinearSettings, SolverChoice};

use super::{Broyden, NonlinearError, NonlinearSolver, Newton, ResetPolicy, SolverStats};

/// Nonlinear solver used by the integrator for implicit stages
#[derive(Debug, Clone)]
pub enum StageSolver {
    Newton(Newton),
    Broyden(Broyden),
}

impl StageSolver {
    pub fn new(
        choice: SolverChoice,
        settings: NonlinearSettings,
        mode: BroydenMode,
        reset: ResetPolicy,
    ) -> Self {
        match choice {
            SolverChoice::Newton => StageSolver::Newton(Newton::new(settings)),
            SolverChoice::Broyden => {
                let mut broyden = Broyden::new(settings, mode);
                broyden.set_reset_policy(reset);
                StageSolver::Broyden(broyden)
            }
        }
    }

    pub fn choice(&self) -> SolverChoice {
        match self {
            StageSolver::Newton(_) => SolverChoice::Newton,
            StageSolver::Broyden(_) => SolverChoice::Broyden,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        match self {
            StageSolver::Newton(s) => s.set_verbose(verbose),
            StageSolver::Broyden(s) => s.set_verbose(verbose),
        }
    }

    pub fn solve<F, J>(
        &mut self,
        residual: F,
        jacobian: J,
        y0: DVector<f64>,
    ) -> Result<DVector<f64>, NonlinearError>
    where
        F: FnMut(&DVector<f64>) -> DVector<f64>,
        J: FnMut(&DVector<f64>) -> DMatrix<f64>,
    {
        match self {
            StageSolver::Newton(s) => s.solve(residual, jacobian, y0),
            StageSolver::Broyden(s) => s.solve(residual, jacobian, y0),
        }
    }

    pub fn stats(&self) -> &SolverStats {
        match self {
            StageSolver::Newton(s) => s.stats(),
            StageSolver::Broyden(s) => s.stats(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageSolver::Newton(s) => s.name(),
            StageSolver::Broyden(s) => s.name(),
        }
    }
}
