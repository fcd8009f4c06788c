//! Integrator settings types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("min_step {min_step} exceeds max_step {max_step}")]
    StepBounds { min_step: f64, max_step: f64 },

    #[error("safety factors must satisfy 0 < min ({min}) < 1 < max ({max})")]
    SafetyBounds { min: f64, max: f64 },

    #[error("safety_factor must lie in (0, 1], got {0}")]
    Safety(f64),

    #[error("relaxation factor must lie in (0, 1), got {0}")]
    Relaxation(f64),

    #[error("{0} must be at least 1")]
    ZeroBudget(&'static str),
}

/// Nonlinear solver used for implicit stage equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SolverChoice {
    /// Damped Newton with a fresh Jacobian every iteration
    #[default]
    Newton,
    /// Quasi-Newton with rank-one inverse Jacobian updates
    Broyden,
}

impl SolverChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverChoice::Newton => "Newton",
            SolverChoice::Broyden => "Broyden",
        }
    }
}

/// Update formula used by the Broyden solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BroydenMode {
    /// "Good" Broyden: rank-one update that keeps `B * dg = dx` with minimal change in `B^-1`
    Good,
    /// "Bad" Broyden: rank-one update that minimizes the change in `B` itself
    Bad,
    /// Choose per iteration between good and bad from the secant ratios
    #[default]
    Combined,
}

impl BroydenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroydenMode::Good => "Good",
            BroydenMode::Bad => "Bad",
            BroydenMode::Combined => "Combined",
        }
    }
}

/// Iteration budgets shared by the Newton and Broyden stage solvers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearSettings {
    /// Convergence threshold on the residual or step norm
    pub tolerance: f64,

    /// Maximum number of outer iterations
    pub max_iterations: usize,

    /// Maximum number of residual evaluations
    pub max_function_evaluations: usize,

    /// Maximum number of Jacobian evaluations
    pub max_jacobian_evaluations: usize,

    /// Maximum number of step relaxations per iteration
    pub max_relaxations: usize,

    /// Factor applied to the relaxation parameter after each failed try
    pub relaxation_factor: f64,
}

impl Default for NonlinearSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
            max_function_evaluations: 1000,
            max_jacobian_evaluations: 1000,
            max_relaxations: 10,
            relaxation_factor: 0.5,
        }
    }
}

impl NonlinearSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        positive("tolerance", self.tolerance)?;
        if !(self.relaxation_factor > 0.0 && self.relaxation_factor < 1.0) {
            return Err(SettingsError::Relaxation(self.relaxation_factor));
        }
        if self.max_iterations == 0 {
            return Err(SettingsError::ZeroBudget("max_iterations"));
        }
        if self.max_function_evaluations == 0 {
            return Err(SettingsError::ZeroBudget("max_function_evaluations"));
        }
        if self.max_jacobian_evaluations == 0 {
            return Err(SettingsError::ZeroBudget("max_jacobian_evaluations"));
        }
        Ok(())
    }
}

/// Runge-Kutta integrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    /// Absolute tolerance for the local error estimate
    pub absolute_tolerance: f64,

    /// Relative tolerance for the local error estimate
    pub relative_tolerance: f64,

    /// Minimum step size magnitude
    pub min_step: f64,

    /// Maximum step size magnitude
    pub max_step: f64,

    /// Lower clamp for the step-size scale factor
    pub min_safety_factor: f64,

    /// Upper clamp for the step-size scale factor
    pub max_safety_factor: f64,

    /// Safety factor applied to the optimal step-size scale
    pub safety_factor: f64,

    /// Maximum number of rejected attempts per step
    pub max_substeps: usize,

    /// Enable adaptive step-size control
    pub enable_adaptive_mode: bool,

    /// Project accepted states onto the invariant manifold
    pub enable_projection: bool,

    /// Invariant residual tolerance for the projection
    pub projection_tolerance: f64,

    /// Maximum projection iterations per accepted step
    pub max_projection_iterations: usize,

    /// Integrate backward in time
    pub enable_reverse_mode: bool,

    /// Emit step-by-step diagnostics through the log facade
    pub enable_verbose_mode: bool,

    /// Stage solver for implicit stages
    pub solver_choice: SolverChoice,

    /// Broyden update formula
    pub broyden_mode: BroydenMode,

    /// Stage solver budgets
    pub nonlinear: NonlinearSettings,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            absolute_tolerance: 1e-6,
            relative_tolerance: 1e-3,
            min_step: 1e-10,
            max_step: 1e3,
            min_safety_factor: 0.1,
            max_safety_factor: 10.0,
            safety_factor: 0.9,
            max_substeps: 5,
            enable_adaptive_mode: true,
            enable_projection: true,
            projection_tolerance: 1e-10,
            max_projection_iterations: 5,
            enable_reverse_mode: false,
            enable_verbose_mode: false,
            solver_choice: SolverChoice::Newton,
            broyden_mode: BroydenMode::Combined,
            nonlinear: NonlinearSettings::default(),
        }
    }
}

impl IntegratorSettings {
    /// Check that every knob is in its admissible range
    pub fn validate(&self) -> Result<(), SettingsError> {
        positive("absolute_tolerance", self.absolute_tolerance)?;
        positive("relative_tolerance", self.relative_tolerance)?;
        positive("min_step", self.min_step)?;
        positive("max_step", self.max_step)?;
        positive("projection_tolerance", self.projection_tolerance)?;
        if self.min_step > self.max_step {
            return Err(SettingsError::StepBounds {
                min_step: self.min_step,
                max_step: self.max_step,
            });
        }
        if !(self.min_safety_factor > 0.0
            && self.min_safety_factor < 1.0
            && self.max_safety_factor > 1.0
            && self.max_safety_factor.is_finite())
        {
            return Err(SettingsError::SafetyBounds {
                min: self.min_safety_factor,
                max: self.max_safety_factor,
            });
        }
        if !(self.safety_factor > 0.0 && self.safety_factor <= 1.0) {
            return Err(SettingsError::Safety(self.safety_factor));
        }
        self.nonlinear.validate()
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), SettingsError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SettingsError::NotPositive { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = IntegratorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.solver_choice.as_str(), "Newton");
        assert_eq!(settings.max_substeps, 5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "absolute_tolerance": 1e-9, "solver_choice": "Broyden", "nonlinear": { "max_iterations": 7 } }"#;
        let settings: IntegratorSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.absolute_tolerance, 1e-9);
        assert_eq!(settings.solver_choice, SolverChoice::Broyden);
        assert_eq!(settings.nonlinear.max_iterations, 7);
        assert_eq!(settings.nonlinear.relaxation_factor, 0.5);
        assert_eq!(settings.relative_tolerance, 1e-3);
    }

    #[test]
    fn test_invalid_settings() {
        let mut settings = IntegratorSettings {
            min_step: 1.0,
            max_step: 0.1,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::StepBounds { .. })
        ));

        settings.max_step = 10.0;
        settings.min_safety_factor = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::SafetyBounds { .. })
        ));

        settings.min_safety_factor = 0.2;
        settings.nonlinear.relaxation_factor = 1.0;
        assert_eq!(settings.validate(), Err(SettingsError::Relaxation(1.0)));
    }
}
