//! Runge-Kutta integrator

use std::ops::ControlFlow;

use log::{debug, warn};
use nalgebra::DVector;
use rksim_types::{BroydenMode, IntegratorSettings, NonlinearSettings, SolverChoice};

use super::base::{Advance, IntegrationError, StepFailure, StepInfo, StepResult};
use super::controller::{error_norm, StepController};
use super::stages::{self, Evaluator};
use crate::optim::{is_finite, ResetPolicy, StageSolver};
use crate::solution::SolutionStats;
use crate::system::System;
use crate::tableau::{Method, Tableau};
use crate::utils::constants::{SIM_TIME_TOLERANCE, SOL_FAILURE_SCALE};

/// Callback invoked with `(t, x, h)` after every accepted step of a solve
///
/// Returning [`ControlFlow::Break`] stops the integration after that step.
pub type StepCallback = Box<dyn FnMut(f64, &DVector<f64>, f64) -> ControlFlow<()> + Send>;

/// Runge-Kutta integrator bound to one tableau and one system
///
/// Dispatches each step on the tableau's coupling pattern and the system's
/// form:
///
/// | Tableau  | System            | Path                                 |
/// |----------|-------------------|--------------------------------------|
/// | explicit | has explicit form | closed-form stages, no solve         |
/// | explicit | implicit          | one solve per stage on `dF/dx'`      |
/// | DIRK     | any               | one solve per stage                  |
/// | IRK      | any               | one joint solve of size `S * N`      |
///
/// Embedded tableaus in adaptive mode drive the step size from the weighted
/// RMS local error estimate; accepted states are optionally projected onto
/// the invariant manifold. In reverse mode the caller's time decreases and
/// step sizes are negative; internally the reflected time `tau = -t` is
/// integrated with positive steps.
///
/// # Example
///
/// ```rust
/// use nalgebra::DVector;
/// use rksim::prelude::*;
///
/// let system = System::explicit(ExplicitWrapper::new("decay", 1, |x, _t| -x));
/// let mut rk = RungeKutta::from_method(Method::DormandPrince54, system).unwrap();
/// let solution = rk.solve(&DVector::from_element(1, 1.0), 0.0, 1.0, 0.1).unwrap();
///
/// let x1 = solution.final_state().unwrap()[0];
/// assert!((x1 - (-1.0_f64).exp()).abs() < 1e-3);
/// ```
pub struct RungeKutta {
    pub(crate) tableau: Tableau,
    pub(crate) system: System,
    pub(crate) settings: IntegratorSettings,
    reset_policy: ResetPolicy,
    solver: StageSolver,
    pub(crate) stats: SolutionStats,
    pub(crate) callback: Option<StepCallback>,
}

impl RungeKutta {
    /// Create an integrator with default settings
    pub fn new(tableau: Tableau, system: System) -> Self {
        let settings = IntegratorSettings::default();
        let reset_policy = ResetPolicy::OnStagnation;
        let solver = StageSolver::new(
            settings.solver_choice,
            settings.nonlinear,
            settings.broyden_mode,
            reset_policy,
        );
        Self {
            tableau,
            system,
            settings,
            reset_policy,
            solver,
            stats: SolutionStats::default(),
            callback: None,
        }
    }

    /// Create an integrator for a catalog method
    pub fn from_method(method: Method, system: System) -> Result<Self, IntegrationError> {
        Ok(Self::new(method.tableau()?, system))
    }

    /// Replace all settings, validating them first
    pub fn with_settings(mut self, settings: IntegratorSettings) -> Result<Self, IntegrationError> {
        self.set_settings(settings)?;
        Ok(self)
    }

    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: IntegratorSettings) -> Result<(), IntegrationError> {
        settings.validate()?;
        self.settings = settings;
        self.rebuild_solver();
        Ok(())
    }

    fn update(&mut self, f: impl FnOnce(&mut IntegratorSettings)) -> Result<(), IntegrationError> {
        let mut settings = self.settings.clone();
        f(&mut settings);
        self.set_settings(settings)
    }

    fn rebuild_solver(&mut self) {
        self.solver = StageSolver::new(
            self.settings.solver_choice,
            self.settings.nonlinear,
            self.settings.broyden_mode,
            self.reset_policy,
        );
        self.solver.set_verbose(self.settings.enable_verbose_mode);
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn absolute_tolerance(&self) -> f64 {
        self.settings.absolute_tolerance
    }

    pub fn set_absolute_tolerance(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.absolute_tolerance = value)
    }

    pub fn relative_tolerance(&self) -> f64 {
        self.settings.relative_tolerance
    }

    pub fn set_relative_tolerance(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.relative_tolerance = value)
    }

    pub fn min_step(&self) -> f64 {
        self.settings.min_step
    }

    pub fn set_min_step(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.min_step = value)
    }

    pub fn max_step(&self) -> f64 {
        self.settings.max_step
    }

    pub fn set_max_step(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.max_step = value)
    }

    pub fn min_safety_factor(&self) -> f64 {
        self.settings.min_safety_factor
    }

    pub fn set_min_safety_factor(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.min_safety_factor = value)
    }

    pub fn max_safety_factor(&self) -> f64 {
        self.settings.max_safety_factor
    }

    pub fn set_max_safety_factor(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.max_safety_factor = value)
    }

    pub fn safety_factor(&self) -> f64 {
        self.settings.safety_factor
    }

    pub fn set_safety_factor(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.safety_factor = value)
    }

    pub fn max_substeps(&self) -> usize {
        self.settings.max_substeps
    }

    pub fn set_max_substeps(&mut self, value: usize) {
        self.settings.max_substeps = value;
    }

    pub fn projection_tolerance(&self) -> f64 {
        self.settings.projection_tolerance
    }

    pub fn set_projection_tolerance(&mut self, value: f64) -> Result<(), IntegrationError> {
        self.update(|s| s.projection_tolerance = value)
    }

    pub fn max_projection_iterations(&self) -> usize {
        self.settings.max_projection_iterations
    }

    pub fn set_max_projection_iterations(&mut self, value: usize) {
        self.settings.max_projection_iterations = value;
    }

    pub fn adaptive_mode(&self) -> bool {
        self.settings.enable_adaptive_mode
    }

    pub fn enable_adaptive_mode(&mut self) {
        self.settings.enable_adaptive_mode = true;
    }

    pub fn disable_adaptive_mode(&mut self) {
        self.settings.enable_adaptive_mode = false;
    }

    pub fn projection(&self) -> bool {
        self.settings.enable_projection
    }

    pub fn enable_projection(&mut self) {
        self.settings.enable_projection = true;
    }

    pub fn disable_projection(&mut self) {
        self.settings.enable_projection = false;
    }

    pub fn reverse_mode(&self) -> bool {
        self.settings.enable_reverse_mode
    }

    pub fn enable_reverse_mode(&mut self) {
        self.settings.enable_reverse_mode = true;
    }

    pub fn disable_reverse_mode(&mut self) {
        self.settings.enable_reverse_mode = false;
    }

    pub fn verbose_mode(&self) -> bool {
        self.settings.enable_verbose_mode
    }

    pub fn enable_verbose_mode(&mut self) {
        self.settings.enable_verbose_mode = true;
        self.solver.set_verbose(true);
    }

    pub fn disable_verbose_mode(&mut self) {
        self.settings.enable_verbose_mode = false;
        self.solver.set_verbose(false);
    }

    pub fn solver_choice(&self) -> SolverChoice {
        self.settings.solver_choice
    }

    pub fn set_solver_choice(&mut self, choice: SolverChoice) {
        self.settings.solver_choice = choice;
        self.rebuild_solver();
    }

    pub fn broyden_mode(&self) -> BroydenMode {
        self.settings.broyden_mode
    }

    pub fn set_broyden_mode(&mut self, mode: BroydenMode) {
        self.settings.broyden_mode = mode;
        self.rebuild_solver();
    }

    /// Policy for rebuilding Broyden's inverse Jacobian
    pub fn reset_policy(&self) -> ResetPolicy {
        self.reset_policy
    }

    pub fn set_reset_policy(&mut self, policy: ResetPolicy) {
        self.reset_policy = policy;
        self.rebuild_solver();
    }

    pub fn nonlinear_settings(&self) -> &NonlinearSettings {
        &self.settings.nonlinear
    }

    pub fn set_nonlinear_settings(&mut self, nonlinear: NonlinearSettings) -> Result<(), IntegrationError> {
        self.update(|s| s.nonlinear = nonlinear)
    }

    /// Register a callback run after every accepted step of a solve
    pub fn set_step_callback<F>(&mut self, callback: F)
    where
        F: FnMut(f64, &DVector<f64>, f64) -> ControlFlow<()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_step_callback(&mut self) {
        self.callback = None;
    }

    /// Counters accumulated since the last solve started (or the last reset)
    pub fn stats(&self) -> &SolutionStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = SolutionStats::default();
    }

    /// Human-readable summary of the configuration
    pub fn info(&self) -> String {
        format!(
            "RungeKutta: method {} ({}, {} stages, order {}{}), system '{}' ({} equations, {} invariants), \
             stage solver {}, adaptive {}, projection {}, reverse {}",
            self.tableau.name(),
            self.tableau.rk_type().as_str(),
            self.tableau.stages(),
            self.tableau.order(),
            self.tableau
                .order_hat()
                .map(|q| format!("({q})"))
                .unwrap_or_default(),
            self.system.name(),
            self.system.equations(),
            self.system.num_invariants(),
            self.solver.name(),
            self.adaptive_active(),
            self.settings.enable_projection,
            self.settings.enable_reverse_mode,
        )
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Perform one step attempt from `(x_n, t_n)` with signed step `h`
    ///
    /// A rejected attempt returns the input state with `accepted == false`
    /// and a strictly smaller proposed step. Domain violations are fatal.
    pub fn step(&mut self, x_n: &DVector<f64>, t_n: f64, h: f64) -> Result<StepResult, IntegrationError> {
        self.check_state(x_n)?;
        let dir = self.direction();
        let h_internal = self.internal_step(h)?;
        let mut result = self.attempt(x_n, dir * t_n, h_internal)?;
        result.h_next *= dir;
        Ok(result)
    }

    /// Advance from `(x_n, t_n)` until a step is accepted
    ///
    /// In adaptive mode rejected attempts are retried with the controller's
    /// proposal; in fixed mode a failed step is covered by successively
    /// halved substeps so the whole interval `[t_n, t_n + h]` is advanced.
    pub fn advance(&mut self, x_n: &DVector<f64>, t_n: f64, h: f64) -> Result<Advance, IntegrationError> {
        self.check_state(x_n)?;
        let dir = self.direction();
        let h_internal = self.internal_step(h)?;
        let mut advance = self.advance_internal(x_n, dir * t_n, h_internal)?;
        advance.t *= dir;
        advance.h_taken *= dir;
        advance.h_next *= dir;
        Ok(advance)
    }

    /// `+1` forward, `-1` in reverse mode
    pub(crate) fn direction(&self) -> f64 {
        if self.settings.enable_reverse_mode {
            -1.0
        } else {
            1.0
        }
    }

    pub(crate) fn adaptive_active(&self) -> bool {
        self.settings.enable_adaptive_mode && self.tableau.is_embedded()
    }

    pub(crate) fn check_state(&self, x: &DVector<f64>) -> Result<(), IntegrationError> {
        let expected = self.system.equations();
        if x.len() != expected {
            return Err(IntegrationError::DimensionMismatch {
                expected,
                found: x.len(),
            });
        }
        Ok(())
    }

    fn internal_step(&self, h: f64) -> Result<f64, IntegrationError> {
        let h_internal = self.direction() * h;
        if h_internal > 0.0 && h_internal.is_finite() {
            Ok(h_internal)
        } else {
            Err(IntegrationError::InvalidStep(h))
        }
    }

    fn reject(&mut self, x_n: &DVector<f64>, h_next: f64, failure: StepFailure, mut info: StepInfo) -> StepResult {
        self.stats.rejected_steps += 1;
        if self.settings.enable_verbose_mode {
            debug!("{}: step rejected ({}), retry with h = {:.3e}", self.tableau.name(), failure, h_next);
        }
        info.failure = Some(failure);
        StepResult {
            x: x_n.clone(),
            h_next,
            accepted: false,
            info,
        }
    }

    /// One attempt in internal time with `h > 0`
    fn attempt(&mut self, x_n: &DVector<f64>, tau: f64, h: f64) -> Result<StepResult, IntegrationError> {
        let dir = self.direction();
        if !self.system.in_domain(x_n, dir * tau) {
            return Err(IntegrationError::Domain {
                t: dir * tau,
                state: x_n.clone(),
            });
        }

        let mut info = StepInfo::new(self.tableau.rk_type());
        let controller = StepController::new(&self.settings, self.tableau.controller_order());
        let computed = {
            let eval = Evaluator::new(&self.system, self.settings.enable_reverse_mode);
            stages::compute(&self.tableau, &eval, &mut self.solver, x_n, tau, h, &mut info)
        };

        self.stats.stage_solves += info.stage_solves;
        self.stats.nonlinear_iterations += info.nonlinear.iterations;
        self.stats.function_evaluations += info.nonlinear.function_evaluations + info.rhs_evaluations;
        self.stats.jacobian_evaluations += info.nonlinear.jacobian_evaluations;

        let k = match computed {
            Ok(k) => k,
            Err(failure) => {
                let h_next = controller.fallback(h, SOL_FAILURE_SCALE);
                return Ok(self.reject(x_n, h_next, failure, info));
            }
        };

        let x_next = stages::combine(x_n, self.tableau.b(), &k);
        if !is_finite(&x_next) {
            let h_next = controller.fallback(h, SOL_FAILURE_SCALE);
            return Ok(self.reject(x_n, h_next, StepFailure::NonFinite, info));
        }

        let mut h_next = h;
        if let Some(b_hat) = self.tableau.b_hat() {
            let x_hat = stages::combine(x_n, b_hat, &k);
            let error = error_norm(
                x_n,
                &x_next,
                &x_hat,
                self.settings.absolute_tolerance,
                self.settings.relative_tolerance,
            );
            info.error = Some(error);
            if self.adaptive_active() {
                if !error.is_finite() {
                    let h_next = controller.fallback(h, SOL_FAILURE_SCALE);
                    return Ok(self.reject(x_n, h_next, StepFailure::NonFinite, info));
                }
                if error > 1.0 {
                    let h_next = controller.shrink(h, error);
                    return Ok(self.reject(x_n, h_next, StepFailure::ErrorTooLarge(error), info));
                }
                h_next = controller.grow(h, error);
            }
        }

        let t_next = dir * (tau + h);
        let mut x_next = x_next;
        if self.settings.enable_projection && self.system.num_invariants() > 0 {
            let projection = self.project(&x_next, t_next);
            if !projection.converged {
                info.projection_failed = true;
                self.stats.projection_failures += 1;
                warn!(
                    "{}: projection did not converge at t = {} (|H| = {:.3e} after {} iterations)",
                    self.tableau.name(),
                    t_next,
                    projection.residual,
                    projection.iterations
                );
            }
            x_next = projection.x;
        }

        if !self.system.in_domain(&x_next, t_next) {
            return Err(IntegrationError::Domain {
                t: t_next,
                state: x_next,
            });
        }

        self.stats.accepted_steps += 1;
        Ok(StepResult {
            x: x_next,
            h_next,
            accepted: true,
            info,
        })
    }

    /// Advance in internal time; the returned times and steps are internal
    pub(crate) fn advance_internal(
        &mut self,
        x_n: &DVector<f64>,
        tau: f64,
        h: f64,
    ) -> Result<Advance, IntegrationError> {
        if self.adaptive_active() {
            self.advance_adaptive(x_n, tau, h)
        } else {
            self.advance_fixed(x_n, tau, h)
        }
    }

    fn underflow(&self, x: &DVector<f64>, tau: f64, h: f64, rejections: usize, info: &StepInfo) -> IntegrationError {
        let dir = self.direction();
        IntegrationError::StepSizeUnderflow {
            t: dir * tau,
            h: dir * h,
            min_step: self.settings.min_step,
            rejections,
            state: x.clone(),
            cause: info.failure.clone().unwrap_or(StepFailure::NonFinite),
        }
    }

    fn advance_adaptive(&mut self, x_n: &DVector<f64>, tau: f64, h: f64) -> Result<Advance, IntegrationError> {
        let mut h = h;
        let mut rejections = 0;
        loop {
            let result = self.attempt(x_n, tau, h)?;
            if result.accepted {
                return Ok(Advance {
                    x: result.x,
                    t: tau + h,
                    h_taken: h,
                    h_next: result.h_next,
                    rejections,
                    info: result.info,
                });
            }
            rejections += 1;
            if rejections > self.settings.max_substeps || result.h_next < self.settings.min_step {
                return Err(self.underflow(x_n, tau, result.h_next, rejections, &result.info));
            }
            h = result.h_next;
        }
    }

    fn advance_fixed(&mut self, x_n: &DVector<f64>, tau: f64, h: f64) -> Result<Advance, IntegrationError> {
        let target = tau + h;
        let mut tau_cur = tau;
        let mut x = x_n.clone();
        let mut h_sub = h;
        let mut rejections = 0;

        loop {
            let remaining = target - tau_cur;
            let landing = h_sub >= remaining * (1.0 - SIM_TIME_TOLERANCE);
            let h_try = if landing { remaining } else { h_sub };

            let result = self.attempt(&x, tau_cur, h_try)?;
            if result.accepted {
                x = result.x;
                if landing {
                    return Ok(Advance {
                        x,
                        t: target,
                        h_taken: h,
                        h_next: h,
                        rejections,
                        info: result.info,
                    });
                }
                tau_cur += h_try;
                continue;
            }

            rejections += 1;
            h_sub = h_try / 2.0;
            if rejections > self.settings.max_substeps || h_sub < self.settings.min_step {
                return Err(self.underflow(&x, tau_cur, h_sub, rejections, &result.info));
            }
            if self.settings.enable_verbose_mode {
                debug!(
                    "{}: fixed step failed at tau = {}, substepping with h = {:.3e}",
                    self.tableau.name(),
                    tau_cur,
                    h_sub
                );
            }
        }
    }
}

impl std::fmt::Debug for RungeKutta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RungeKutta")
            .field("tableau", &self.tableau.name())
            .field("system", &self.system)
            .field("settings", &self.settings)
            .field("reset_policy", &self.reset_policy)
            .field("stats", &self.stats)
            .finish()
    }
}
