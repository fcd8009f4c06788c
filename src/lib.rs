//! RkSim - Runge-Kutta integration of ODE and DAE systems
//!
//! Integrates systems given in implicit form `F(x, x', t) = 0` (or any of the
//! explicit, semi-explicit and linear special forms) with an arbitrary
//! Butcher tableau, explicit, diagonally implicit or fully implicit.
//!
//! # Architecture
//!
//! - [`tableau`]: validated Butcher tableaus and the method catalog
//! - [`system`]: the system contract and closure-based wrappers
//! - [`optim`]: damped Newton and Broyden solvers for implicit stages
//! - [`solvers`]: the [`RungeKutta`] engine (stages, step control,
//!   projection, reverse mode and the interval drivers)
//! - [`solution`]: the recorded trajectory
//!
//! Settings live in the `rksim-types` crate so they can be serialized
//! without pulling in the numerics.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::DVector;
//! use rksim::prelude::*;
//!
//! // x'' = -x as a first order system
//! let oscillator = ExplicitWrapper::new("oscillator", 2, |x, _t| {
//!     DVector::from_vec(vec![x[1], -x[0]])
//! });
//! let mut rk = RungeKutta::from_method(Method::RadauIIA5, System::explicit(oscillator)).unwrap();
//! rk.disable_adaptive_mode();
//!
//! let x0 = DVector::from_vec(vec![1.0, 0.0]);
//! let solution = rk.solve(&x0, 0.0, 1.0, 0.05).unwrap();
//! let x1 = solution.final_state().unwrap();
//! assert!((x1[0] - 1.0_f64.cos()).abs() < 1e-6);
//! ```

pub mod optim;
pub mod solution;
pub mod solvers;
pub mod system;
pub mod tableau;
pub mod utils;

pub use rksim_types::{
    BroydenMode, IntegratorSettings, NonlinearSettings, SettingsError, SolverChoice,
};
pub use solution::{Solution, SolutionStats};
pub use solvers::{IntegrationError, RungeKutta};
pub use system::System;
pub use tableau::{Method, Tableau};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::optim::{NonlinearError, ResetPolicy};
    pub use crate::solution::{Solution, SolutionStats};
    pub use crate::solvers::*;
    pub use crate::system::*;
    pub use crate::tableau::{Method, RkType, Tableau, TableauError};
    pub use rksim_types::{BroydenMode, IntegratorSettings, NonlinearSettings, SolverChoice};
}
