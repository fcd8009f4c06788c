//! Base integrator error and step types

use nalgebra::DVector;
use rksim_types::SettingsError;
use thiserror::Error;

use crate::optim::{NonlinearError, SolverStats};
use crate::tableau::{RkType, TableauError};

/// Why a step attempt was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepFailure {
    #[error("local error estimate {0:.3e} exceeds tolerance")]
    ErrorTooLarge(f64),

    #[error("stage solve failed: {0}")]
    Stage(#[from] NonlinearError),

    #[error("non-finite stage or state values")]
    NonFinite,
}

/// Integration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("Malformed tableau: {0}")]
    MalformedTableau(#[from] TableauError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("State has {found} components, system expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid time span [{t0}, {t1}] for the current direction")]
    InvalidTimeSpan { t0: f64, t1: f64 },

    #[error("Invalid step size {0}")]
    InvalidStep(f64),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(&'static str),

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Step control gave up: the retry step fell below `min_step` or the
    /// attempt was rejected more than `max_substeps` times
    #[error("{}: {cause}", underflow_reason(.t, .h, .min_step, .rejections))]
    StepSizeUnderflow {
        t: f64,
        h: f64,
        min_step: f64,
        rejections: usize,
        state: DVector<f64>,
        cause: StepFailure,
    },

    #[error("State left the system domain at t = {t}")]
    Domain { t: f64, state: DVector<f64> },
}

fn underflow_reason(t: &f64, h: &f64, min_step: &f64, rejections: &usize) -> String {
    if h.abs() < *min_step {
        format!("Step size {h:.3e} at t = {t} fell below minimum {min_step:.3e}")
    } else {
        format!("Step at t = {t} exceeded {rejections} rejected substeps (next step size {h:.3e})")
    }
}

/// Diagnostics of one step attempt
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Stage coupling pattern that was dispatched
    pub rk_type: RkType,
    /// Weighted RMS local error estimate (embedded tableaus only)
    pub error: Option<f64>,
    /// Reason for rejection, if any
    pub failure: Option<StepFailure>,
    /// Projection was attempted and did not converge
    pub projection_failed: bool,
    /// Accumulated nonlinear solver diagnostics of all stage solves
    pub nonlinear: SolverStats,
    /// Number of nonlinear stage solves
    pub stage_solves: usize,
    /// Number of explicit right-hand side evaluations
    pub rhs_evaluations: usize,
}

impl StepInfo {
    pub(crate) fn new(rk_type: RkType) -> Self {
        Self {
            rk_type,
            error: None,
            failure: None,
            projection_failed: false,
            nonlinear: SolverStats::default(),
            stage_solves: 0,
            rhs_evaluations: 0,
        }
    }
}

/// Result of a single step attempt
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// New state (the input state when rejected)
    pub x: DVector<f64>,
    /// Proposed next step size, signed like the requested one
    pub h_next: f64,
    pub accepted: bool,
    pub info: StepInfo,
}

/// Result of advancing until a step is accepted
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub x: DVector<f64>,
    /// Time reached
    pub t: f64,
    /// Signed step actually covered
    pub h_taken: f64,
    /// Proposed next step size
    pub h_next: f64,
    /// Rejected attempts before acceptance
    pub rejections: usize,
    pub info: StepInfo,
}
