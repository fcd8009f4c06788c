//! Runge-Kutta integration engine

mod base;
mod controller;
mod driver;
mod projection;
mod runge_kutta;
mod stages;

pub use base::{Advance, IntegrationError, StepFailure, StepInfo, StepResult};
pub use controller::{error_norm, StepController};
pub use projection::Projection;
pub use runge_kutta::{RungeKutta, StepCallback};
