//! Nonlinear solvers
//!
//! Provides the damped Newton and Broyden quasi-Newton solvers used for
//! implicit stage equations, a guarded dense LU, and numerical
//! differentiation.

mod base;
mod broyden;
mod jacobian;
mod newton;
mod stage;

pub use base::*;
pub(crate) use base::is_finite;
pub use broyden::{Broyden, ResetPolicy};
pub use jacobian::numerical_jacobian;
pub use newton::Newton;
pub use stage::StageSolver;
