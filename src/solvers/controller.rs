//! Local error estimate and step-size control

use nalgebra::DVector;
use rksim_types::IntegratorSettings;

use crate::utils::constants::SOL_ERROR_MIN;

/// Weighted RMS norm of the difference between two solutions
///
/// Component `i` is scaled by `atol + rtol * max(|x_n[i]|, |x_next[i]|)`.
/// An empty state has zero error.
pub fn error_norm(
    x_n: &DVector<f64>,
    x_next: &DVector<f64>,
    x_hat: &DVector<f64>,
    atol: f64,
    rtol: f64,
) -> f64 {
    let n = x_n.len();
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = (0..n)
        .map(|i| {
            let scale = atol + rtol * x_n[i].abs().max(x_next[i].abs());
            ((x_next[i] - x_hat[i]) / scale).powi(2)
        })
        .sum();
    (sum / n as f64).sqrt()
}

/// Step-size controller driven by the embedded error estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepController {
    safety: f64,
    min_factor: f64,
    max_factor: f64,
    min_step: f64,
    max_step: f64,
    /// Exponent `1 / (q + 1)` with `q` the lower order of the pair
    exponent: f64,
}

impl StepController {
    pub fn new(settings: &IntegratorSettings, order: usize) -> Self {
        Self {
            safety: settings.safety_factor,
            min_factor: settings.min_safety_factor,
            max_factor: settings.max_safety_factor,
            min_step: settings.min_step,
            max_step: settings.max_step,
            exponent: 1.0 / (order as f64 + 1.0),
        }
    }

    /// Scale factor `safety * e^(-1/(q+1))` clamped to the safety bounds
    pub fn factor(&self, error: f64) -> f64 {
        let error = error.max(SOL_ERROR_MIN);
        (self.safety * error.powf(-self.exponent)).clamp(self.min_factor, self.max_factor)
    }

    /// Next step size after an accepted step of size `h`
    pub fn grow(&self, h: f64, error: f64) -> f64 {
        (h * self.factor(error)).clamp(self.min_step, self.max_step)
    }

    /// Retry step size after rejecting a step of size `h` with error `error > 1`
    ///
    /// The result is strictly below `h` and not below `min_safety_factor * h`.
    /// It is raised to `min_step` when that still satisfies both bounds.
    pub fn shrink(&self, h: f64, error: f64) -> f64 {
        let factor = self.factor(error).min(self.safety);
        self.floor(h, h * factor)
    }

    /// Retry step size after a failed stage solve
    pub fn fallback(&self, h: f64, scale: f64) -> f64 {
        self.floor(h, h * scale.max(self.min_factor))
    }

    fn floor(&self, h: f64, proposed: f64) -> f64 {
        if proposed < self.min_step && h > self.min_step {
            self.min_step
        } else {
            proposed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_error_norm_weighting() {
        let x_n = DVector::from_vec(vec![1.0, 0.0]);
        let x_next = DVector::from_vec(vec![2.0, 0.0]);
        let x_hat = DVector::from_vec(vec![2.0 + 3e-6, 1e-6]);
        // scales: 1e-6 + 1e-3 * 2, 1e-6
        let expected = ((3e-6_f64 / 2.001e-3).powi(2) / 2.0 + 0.5).sqrt();
        assert_relative_eq!(error_norm(&x_n, &x_next, &x_hat, 1e-6, 1e-3), expected, epsilon = 1e-12);
        assert_eq!(error_norm(&DVector::zeros(0), &DVector::zeros(0), &DVector::zeros(0), 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_factor_clamped() {
        let controller = StepController::new(&IntegratorSettings::default(), 4);
        assert_relative_eq!(controller.factor(0.0), 10.0);
        assert_relative_eq!(controller.factor(1e12), 0.1);
        assert_relative_eq!(controller.factor(1.0), 0.9);
    }

    #[test]
    fn test_rejection_monotonicity() {
        let settings = IntegratorSettings::default();
        let controller = StepController::new(&settings, 2);
        for error in [1.0 + 1e-12, 1.5, 10.0, 1e3, 1e9] {
            let h = 0.1;
            let h_new = controller.shrink(h, error);
            assert!(h_new < h, "error {error}: {h_new} >= {h}");
            assert!(h_new >= settings.min_safety_factor * h);
        }
    }

    #[test]
    fn test_grow_respects_bounds() {
        let settings = IntegratorSettings {
            max_step: 0.5,
            ..Default::default()
        };
        let controller = StepController::new(&settings, 4);
        assert_relative_eq!(controller.grow(0.2, 1e-10), 0.5);
        assert_relative_eq!(controller.grow(0.2, 1.0), 0.18, epsilon = 1e-14);
    }
}
