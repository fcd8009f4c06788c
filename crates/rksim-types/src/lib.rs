//! Shared configuration types for the rksim integration engine.
//!
//! This crate holds the serde-serializable knobs of the stepping engine so
//! that front ends can load and store them without pulling in the numerics:
//! - Step-size controller tolerances and safety factors
//! - Projection and reverse-time switches
//! - Nonlinear stage-solver selection and iteration budgets

mod settings;

pub use settings::*;
