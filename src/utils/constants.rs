//! Integrator constants and defaults

/// Fallback shrink factor after a failed stage solve
pub const SOL_FAILURE_SCALE: f64 = 0.5;

/// Lower bound of the local error norm used by the step-size controller
pub const SOL_ERROR_MIN: f64 = 1e-16;

/// Relative tolerance when deciding that an interval end has been reached
pub const SIM_TIME_TOLERANCE: f64 = 1e-12;

/// Minimum number of meshes needed to fit an empirical order
pub const ORDER_PROBE_MIN_MESHES: usize = 2;
