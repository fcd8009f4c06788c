//! Damped Newton solver

use log::trace;
use nalgebra::{DMatrix, DVector};
use rksim_types::NonlinearSettings;

use super::base::{is_finite, DenseLu, NonlinearError, NonlinearSolver, SolverStats};

/// Damped (globalized) Newton method
///
/// Each iteration factorizes a fresh Jacobian and solves `J * d = -g`. The
/// step is relaxed by `relaxation_factor` while neither the residual norm
/// decreases nor the simplified Newton step passes the natural monotonicity
/// test `|d_bar| <= (1 - tau / 2) |d|`.
///
/// # References
/// - Deuflhard, P. (2011). "Newton Methods for Nonlinear Problems".
///   Springer Series in Computational Mathematics, Vol. 35.
#[derive(Debug, Clone)]
pub struct Newton {
    settings: NonlinearSettings,
    stats: SolverStats,
    verbose: bool,
}

impl Newton {
    pub fn new(settings: NonlinearSettings) -> Self {
        Self {
            settings,
            stats: SolverStats::default(),
            verbose: false,
        }
    }

    pub fn set_settings(&mut self, settings: NonlinearSettings) {
        self.settings = settings;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn evaluate<F>(&mut self, residual: &mut F, y: &DVector<f64>) -> Result<DVector<f64>, NonlinearError>
    where
        F: FnMut(&DVector<f64>) -> DVector<f64>,
    {
        if self.stats.function_evaluations >= self.settings.max_function_evaluations {
            return Err(NonlinearError::MaxFunctionEvaluations(
                self.settings.max_function_evaluations,
            ));
        }
        self.stats.function_evaluations += 1;
        Ok(residual(y))
    }
}

impl Default for Newton {
    fn default() -> Self {
        Self::new(NonlinearSettings::default())
    }
}

impl NonlinearSolver for Newton {
    fn solve<F, J>(
        &mut self,
        mut residual: F,
        mut jacobian: J,
        y0: DVector<f64>,
    ) -> Result<DVector<f64>, NonlinearError>
    where
        F: FnMut(&DVector<f64>) -> DVector<f64>,
        J: FnMut(&DVector<f64>) -> DMatrix<f64>,
    {
        self.stats = SolverStats::default();
        let tol = self.settings.tolerance;

        let mut y = y0;
        let mut g = self.evaluate(&mut residual, &y)?;
        if !is_finite(&g) {
            return Err(NonlinearError::NonFinite { iteration: 0 });
        }
        let mut g_norm = g.norm();
        self.stats.residual_norm = g_norm;

        while self.stats.iterations < self.settings.max_iterations {
            if g_norm < tol {
                self.stats.converged = true;
                return Ok(y);
            }
            self.stats.iterations += 1;
            let iteration = self.stats.iterations;

            if self.stats.jacobian_evaluations >= self.settings.max_jacobian_evaluations {
                return Err(NonlinearError::MaxJacobianEvaluations(
                    self.settings.max_jacobian_evaluations,
                ));
            }
            self.stats.jacobian_evaluations += 1;
            let lu = DenseLu::new(jacobian(&y))
                .ok_or(NonlinearError::SingularJacobian { iteration })?;
            let step = lu
                .solve(&-&g)
                .ok_or(NonlinearError::SingularJacobian { iteration })?;
            let step_norm = step.norm();

            if step_norm < tol {
                y += step;
                g = self.evaluate(&mut residual, &y)?;
                self.stats.residual_norm = g.norm();
                self.stats.converged = true;
                return Ok(y);
            }

            // Relaxation loop
            let mut tau = 1.0;
            let mut trial = None;
            for relaxation in 0..=self.settings.max_relaxations {
                let y_new = &y + tau * &step;
                let g_new = self.evaluate(&mut residual, &y_new)?;
                if is_finite(&g_new) {
                    let g_new_norm = g_new.norm();
                    let simplified = lu.solve(&-&g_new).map_or(f64::INFINITY, |d| d.norm());
                    let accepted =
                        g_new_norm < g_norm || simplified <= (1.0 - tau / 2.0) * step_norm;
                    trial = Some((y_new, g_new, g_new_norm));
                    if accepted {
                        break;
                    }
                }
                if relaxation < self.settings.max_relaxations {
                    tau *= self.settings.relaxation_factor;
                    self.stats.relaxations += 1;
                }
            }

            let Some((y_new, g_new, g_new_norm)) = trial else {
                return Err(NonlinearError::NonFinite { iteration });
            };
            if self.verbose {
                trace!(
                    "Newton iteration {}: |g| = {:.3e}, |d| = {:.3e}, tau = {:.3e}",
                    iteration,
                    g_new_norm,
                    step_norm,
                    tau
                );
            }
            y = y_new;
            g = g_new;
            g_norm = g_new_norm;
            self.stats.residual_norm = g_norm;
        }

        if g_norm < tol {
            self.stats.converged = true;
            return Ok(y);
        }
        Err(NonlinearError::MaxIterations(self.settings.max_iterations))
    }

    fn stats(&self) -> &SolverStats {
        &self.stats
    }

    fn settings(&self) -> &NonlinearSettings {
        &self.settings
    }

    fn name(&self) -> &'static str {
        "Newton"
    }
}
