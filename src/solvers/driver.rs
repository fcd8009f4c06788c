//! Interval drivers
//!
//! `solve` marches over `[t0, t1]` with the controller's step proposals,
//! `solve_mesh` visits a caller-provided mesh and `estimate_order` fits the
//! empirical convergence order from a family of meshes.

use std::ops::ControlFlow;

use log::debug;
use nalgebra::DVector;

use super::base::IntegrationError;
use super::runge_kutta::RungeKutta;
use crate::solution::Solution;
use crate::utils::constants::{ORDER_PROBE_MIN_MESHES, SIM_TIME_TOLERANCE};

/// Where `march` stopped
enum March {
    Completed(DVector<f64>),
    Interrupted,
}

impl RungeKutta {
    /// Integrate from `t0` to `t1` starting with step `h0`
    ///
    /// `t1 > t0` in forward mode and `t1 < t0` in reverse mode. The magnitude
    /// of `h0` is used and clamped to `[min_step, max_step]`; the final
    /// sample lands exactly on `t1` unless the step callback interrupts.
    pub fn solve(&mut self, x0: &DVector<f64>, t0: f64, t1: f64, h0: f64) -> Result<Solution, IntegrationError> {
        self.check_state(x0)?;
        let dir = self.direction();
        let (tau0, tau1) = (dir * t0, dir * t1);
        if !(tau1 > tau0) || !tau0.is_finite() || !tau1.is_finite() {
            return Err(IntegrationError::InvalidTimeSpan { t0, t1 });
        }
        if !(h0.abs() > 0.0) || !h0.is_finite() {
            return Err(IntegrationError::InvalidStep(h0));
        }

        self.reset_stats();
        let h = h0.abs().clamp(self.settings.min_step, self.settings.max_step);
        let capacity = ((tau1 - tau0) / h).ceil().min(1e6) as usize + 1;
        let mut solution = Solution::with_capacity(capacity);
        solution.push(t0, x0.clone(), 0.0, self.system.invariants(x0, t0));

        if self.settings.enable_verbose_mode {
            debug!("{}", self.info());
        }

        let (outcome, _) = self.march(x0, tau0, tau1, h, Some(&mut solution))?;
        solution.set_interrupted(matches!(outcome, March::Interrupted));
        solution.set_stats(self.stats);
        Ok(solution)
    }

    /// Integrate over a mesh, recording the state at every mesh point
    ///
    /// The mesh must be strictly increasing (strictly decreasing in reverse
    /// mode). Between mesh points the integrator takes as many steps as the
    /// controller requires; in fixed-step mode each interval is one step.
    pub fn solve_mesh(&mut self, mesh: &[f64], x0: &DVector<f64>) -> Result<Solution, IntegrationError> {
        self.check_state(x0)?;
        if mesh.len() < 2 {
            return Err(IntegrationError::InvalidMesh("at least two points are required"));
        }
        let dir = self.direction();
        if mesh.iter().any(|t| !t.is_finite()) {
            return Err(IntegrationError::InvalidMesh("mesh points must be finite"));
        }
        if mesh.windows(2).any(|w| !(dir * w[1] > dir * w[0])) {
            return Err(IntegrationError::InvalidMesh("mesh must be strictly monotone in the integration direction"));
        }

        self.reset_stats();
        let mut solution = Solution::with_capacity(mesh.len());
        solution.push(mesh[0], x0.clone(), 0.0, self.system.invariants(x0, mesh[0]));

        let mut x = x0.clone();
        let mut h = (mesh[1] - mesh[0]).abs().clamp(self.settings.min_step, self.settings.max_step);
        for w in mesh.windows(2) {
            let (tau0, tau1) = (dir * w[0], dir * w[1]);
            if !self.adaptive_active() {
                h = tau1 - tau0;
            }
            match self.march(&x, tau0, tau1, h, None)? {
                (March::Completed(x_next), h_next) => {
                    let t = w[1];
                    let invariants = self.system.invariants(&x_next, t);
                    solution.push(t, x_next.clone(), dir * (tau1 - tau0), invariants);
                    x = x_next;
                    h = h_next;
                }
                (March::Interrupted, _) => {
                    solution.set_interrupted(true);
                    break;
                }
            }
        }

        solution.set_stats(self.stats);
        Ok(solution)
    }

    /// Estimate the convergence order by integrating on each mesh in fixed
    /// step mode and fitting `log(error)` against `log(h_max)`
    ///
    /// `exact` gives the reference solution; the error of a mesh is the
    /// largest max-norm deviation over its points.
    pub fn estimate_order<E>(&mut self, meshes: &[Vec<f64>], x0: &DVector<f64>, exact: E) -> Result<f64, IntegrationError>
    where
        E: Fn(f64) -> DVector<f64>,
    {
        if meshes.len() < ORDER_PROBE_MIN_MESHES {
            return Err(IntegrationError::InvalidMesh("order estimation needs at least two meshes"));
        }

        let adaptive = self.settings.enable_adaptive_mode;
        self.settings.enable_adaptive_mode = false;
        let result = self.order_samples(meshes, x0, &exact);
        self.settings.enable_adaptive_mode = adaptive;
        let samples = result?;

        // Least-squares slope of log(error) over log(h)
        let n = samples.len() as f64;
        let mean_h = samples.iter().map(|(h, _)| h).sum::<f64>() / n;
        let mean_e = samples.iter().map(|(_, e)| e).sum::<f64>() / n;
        let (num, den) = samples.iter().fold((0.0, 0.0), |(num, den), (h, e)| {
            (num + (h - mean_h) * (e - mean_e), den + (h - mean_h).powi(2))
        });
        if den <= 0.0 {
            return Err(IntegrationError::InvalidMesh("meshes must have distinct spacings"));
        }
        Ok(num / den)
    }

    /// `(log h_max, log error)` per mesh
    fn order_samples<E>(&mut self, meshes: &[Vec<f64>], x0: &DVector<f64>, exact: &E) -> Result<Vec<(f64, f64)>, IntegrationError>
    where
        E: Fn(f64) -> DVector<f64>,
    {
        let mut samples = Vec::with_capacity(meshes.len());
        for mesh in meshes {
            let solution = self.solve_mesh(mesh, x0)?;
            let h_max = mesh.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0, f64::max);
            let error = solution
                .times()
                .iter()
                .zip(solution.states())
                .map(|(&t, x)| (x - exact(t)).amax())
                .fold(0.0, f64::max);
            if !(error > 0.0) || !error.is_finite() {
                return Err(IntegrationError::InvalidMesh("error is zero or not finite on a mesh"));
            }
            samples.push((h_max.ln(), error.ln()));
        }
        Ok(samples)
    }

    /// March in internal time from `tau0` to `tau1`
    ///
    /// When the remainder after a step would fall below `min_step` the step
    /// is stretched to land on `tau1`; if that exceeds `max_step` the
    /// remainder is split in two. Returns the outcome with the step proposed
    /// for whatever follows `tau1`.
    fn march(
        &mut self,
        x0: &DVector<f64>,
        tau0: f64,
        tau1: f64,
        h0: f64,
        mut solution: Option<&mut Solution>,
    ) -> Result<(March, f64), IntegrationError> {
        let dir = self.direction();
        let span = tau1 - tau0;
        let mut x = x0.clone();
        let mut tau = tau0;
        let mut h = h0;

        loop {
            let remaining = tau1 - tau;
            if remaining <= SIM_TIME_TOLERANCE * span.abs().max(1.0) {
                return Ok((March::Completed(x), h));
            }

            let mut h_try = h.min(remaining);
            let landing = remaining - h_try < self.settings.min_step;
            if landing {
                h_try = remaining;
                if h_try > self.settings.max_step {
                    h_try = remaining / 2.0;
                }
            }

            let advance = self.advance_internal(&x, tau, h_try)?;
            x = advance.x;
            let reached = landing && advance.h_taken >= remaining;
            tau = if reached { tau1 } else { advance.t };
            h = if self.adaptive_active() { advance.h_next } else { h0 };

            if self.settings.enable_verbose_mode {
                debug!(
                    "{}: t = {:.6e}, h = {:.3e}, rejections = {}, error = {:?}",
                    self.tableau.name(),
                    dir * tau,
                    dir * advance.h_taken,
                    advance.rejections,
                    advance.info.error
                );
            }

            let t = dir * tau;
            if let Some(solution) = solution.as_deref_mut() {
                let invariants = self.system.invariants(&x, t);
                solution.push(t, x.clone(), dir * advance.h_taken, invariants);
            }

            if let Some(callback) = self.callback.as_mut() {
                if let ControlFlow::Break(()) = callback(t, &x, dir * advance.h_taken) {
                    if self.settings.enable_verbose_mode {
                        debug!("{}: interrupted by step callback at t = {}", self.tableau.name(), t);
                    }
                    return Ok((March::Interrupted, h));
                }
            }

            if reached {
                return Ok((March::Completed(x), h));
            }
        }
    }
}
