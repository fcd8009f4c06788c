//! Broyden quasi-Newton solver

use log::trace;
use nalgebra::{DMatrix, DVector};
use rksim_types::{BroydenMode, NonlinearSettings};

use super::base::{is_finite, DenseLu, NonlinearError, NonlinearSolver, SolverStats};

/// Smallest admissible magnitude of a Broyden update denominator
const DENOMINATOR_MIN: f64 = 1e-300;

/// When the inverse Jacobian approximation is rebuilt from a fresh Jacobian
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Only the initial Jacobian is ever evaluated
    Never,
    /// Re-evaluate when the relaxation loop cannot reduce the residual or
    /// the secant update degenerates
    #[default]
    OnStagnation,
}

/// Broyden's method on the inverse Jacobian
///
/// Keeps `B ~ J^-1`, initialized from one factorized Jacobian and updated
/// with rank-one secant corrections from consecutive `(dy, dg)` pairs.
///
/// # References
/// - Broyden, C. G. (1965). "A class of methods for solving nonlinear
///   simultaneous equations". Mathematics of Computation, 19(92), 577-593.
/// - Martinez, J. M. (2000). "Practical quasi-Newton methods for solving
///   nonlinear systems". Journal of Computational and Applied Mathematics,
///   124(1-2), 97-121.
#[derive(Debug, Clone)]
pub struct Broyden {
    settings: NonlinearSettings,
    mode: BroydenMode,
    reset: ResetPolicy,
    stats: SolverStats,
    verbose: bool,
}

impl Broyden {
    pub fn new(settings: NonlinearSettings, mode: BroydenMode) -> Self {
        Self {
            settings,
            mode,
            reset: ResetPolicy::default(),
            stats: SolverStats::default(),
            verbose: false,
        }
    }

    pub fn set_settings(&mut self, settings: NonlinearSettings) {
        self.settings = settings;
    }

    pub fn mode(&self) -> BroydenMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: BroydenMode) {
        self.mode = mode;
    }

    pub fn reset_policy(&self) -> ResetPolicy {
        self.reset
    }

    pub fn set_reset_policy(&mut self, reset: ResetPolicy) {
        self.reset = reset;
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

    /// Evaluate and invert the Jacobian at `y`
    fn inverse_jacobian<J>(&mut self, jacobian: &mut J, y: &DVector<f64>) -> Result<DMatrix<f64>, NonlinearError>
    where
        J: FnMut(&DVector<f64>) -> DMatrix<f64>,
    {
        let iteration = self.stats.iterations;
        if self.stats.jacobian_evaluations >= self.settings.max_jacobian_evaluations {
            return Err(NonlinearError::MaxJacobianEvaluations(
                self.settings.max_jacobian_evaluations,
            ));
        }
        self.stats.jacobian_evaluations += 1;
        DenseLu::new(jacobian(y))
            .and_then(|lu| lu.inverse())
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .ok_or(NonlinearError::SingularJacobian { iteration })
    }

    /// Whether the "good" update should be used for this iteration
    fn use_good_update(
        &self,
        b: &DMatrix<f64>,
        dy: &DVector<f64>,
        dg: &DVector<f64>,
        previous: Option<&(DVector<f64>, DVector<f64>)>,
    ) -> bool {
        match self.mode {
            BroydenMode::Good => true,
            BroydenMode::Bad => false,
            BroydenMode::Combined => match previous {
                Some((dy_old, dg_old)) if self.stats.iterations >= 2 => {
                    let good = (dy.dot(dy_old) / dy.dot(&(b * dg))).abs();
                    let bad = (dg.dot(dg_old) / dg.dot(dg)).abs();
                    good < bad
                }
                _ => true,
            },
        }
    }
}

impl Default for Broyden {
    fn default() -> Self {
        Self::new(NonlinearSettings::default(), BroydenMode::default())
    }
}

impl NonlinearSolver for Broyden {
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
        if g_norm < tol {
            self.stats.converged = true;
            return Ok(y);
        }

        let mut b = self.inverse_jacobian(&mut jacobian, &y)?;
        let mut previous: Option<(DVector<f64>, DVector<f64>)> = None;

        while self.stats.iterations < self.settings.max_iterations {
            if g_norm < tol {
                self.stats.converged = true;
                return Ok(y);
            }
            self.stats.iterations += 1;
            let iteration = self.stats.iterations;

            let step = -(&b * &g);
            let step_norm = step.norm();
            if !step_norm.is_finite() {
                return Err(NonlinearError::NonFinite { iteration });
            }
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
            let mut decreased = false;
            for relaxation in 0..=self.settings.max_relaxations {
                let y_new = &y + tau * &step;
                let g_new = self.evaluate(&mut residual, &y_new)?;
                if is_finite(&g_new) {
                    let g_new_norm = g_new.norm();
                    let simplified = (&b * &g_new).norm();
                    decreased =
                        g_new_norm < g_norm || simplified <= (1.0 - tau / 2.0) * step_norm;
                    trial = Some((y_new, g_new, g_new_norm));
                    if decreased {
                        break;
                    }
                }
                if relaxation < self.settings.max_relaxations {
                    tau *= self.settings.relaxation_factor;
                    self.stats.relaxations += 1;
                }
            }

            if !decreased && self.reset == ResetPolicy::OnStagnation {
                if self.verbose {
                    trace!("Broyden iteration {}: stagnation, resetting Jacobian", iteration);
                }
                b = self.inverse_jacobian(&mut jacobian, &y)?;
                previous = None;
                continue;
            }

            let Some((y_new, g_new, g_new_norm)) = trial else {
                return Err(NonlinearError::NonFinite { iteration });
            };

            let dy = &y_new - &y;
            let dg = &g_new - &g;
            let b_dg = &b * &dg;
            let correction = &dy - &b_dg;

            let good = self.use_good_update(&b, &dy, &dg, previous.as_ref());
            let denominator = if good { dy.dot(&b_dg) } else { dg.dot(&dg) };

            if denominator.abs() > DENOMINATOR_MIN && denominator.is_finite() {
                if good {
                    let dy_b = b.tr_mul(&dy).transpose();
                    b += &correction * dy_b / denominator;
                } else {
                    b += &correction * dg.transpose() / denominator;
                }
            } else if self.reset == ResetPolicy::OnStagnation {
                b = self.inverse_jacobian(&mut jacobian, &y_new)?;
            }

            if self.verbose {
                trace!(
                    "Broyden iteration {}: |g| = {:.3e}, |d| = {:.3e}, tau = {:.3e}, {} update",
                    iteration,
                    g_new_norm,
                    step_norm,
                    tau,
                    if good { "good" } else { "bad" }
                );
            }

            previous = Some((dy, dg));
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
        "Broyden"
    }
}
