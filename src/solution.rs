//! Integration trajectory

use nalgebra::DVector;

/// Counters accumulated over an integration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolutionStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub stage_solves: usize,
    pub nonlinear_iterations: usize,
    pub function_evaluations: usize,
    pub jacobian_evaluations: usize,
    pub projection_failures: usize,
}

/// Accepted samples `(t_i, x_i, h_i)` in insertion order
///
/// `h_i` is the signed step that produced sample `i`; the initial sample
/// carries a zero step. Invariant values `H(x_i, t_i)` are stored alongside
/// when the system has invariants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    t: Vec<f64>,
    x: Vec<DVector<f64>>,
    h: Vec<f64>,
    invariants: Vec<DVector<f64>>,
    stats: SolutionStats,
    interrupted: bool,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut solution = Self::default();
        solution.reserve(capacity);
        solution
    }

    pub fn push(&mut self, t: f64, x: DVector<f64>, h: f64, invariants: DVector<f64>) {
        self.t.push(t);
        self.x.push(x);
        self.h.push(h);
        self.invariants.push(invariants);
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.t.reserve(additional);
        self.x.reserve(additional);
        self.h.reserve(additional);
        self.invariants.reserve(additional);
    }

    pub fn truncate(&mut self, len: usize) {
        self.t.truncate(len);
        self.x.truncate(len);
        self.h.truncate(len);
        self.invariants.truncate(len);
    }

    pub fn clear(&mut self) {
        self.truncate(0);
        self.stats = SolutionStats::default();
        self.interrupted = false;
    }

    pub fn times(&self) -> &[f64] {
        &self.t
    }

    pub fn states(&self) -> &[DVector<f64>] {
        &self.x
    }

    pub fn steps(&self) -> &[f64] {
        &self.h
    }

    pub fn invariants(&self) -> &[DVector<f64>] {
        &self.invariants
    }

    pub fn time(&self, i: usize) -> Option<f64> {
        self.t.get(i).copied()
    }

    pub fn state(&self, i: usize) -> Option<&DVector<f64>> {
        self.x.get(i)
    }

    pub fn step(&self, i: usize) -> Option<f64> {
        self.h.get(i).copied()
    }

    /// Time history of state component `i`
    pub fn component(&self, i: usize) -> Vec<f64> {
        self.x.iter().map(|x| x[i]).collect()
    }

    pub fn final_time(&self) -> Option<f64> {
        self.t.last().copied()
    }

    pub fn final_state(&self) -> Option<&DVector<f64>> {
        self.x.last()
    }

    pub fn stats(&self) -> &SolutionStats {
        &self.stats
    }

    /// Whether the integration was stopped early by the step callback
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub(crate) fn set_stats(&mut self, stats: SolutionStats) {
        self.stats = stats;
    }

    pub(crate) fn set_interrupted(&mut self, interrupted: bool) {
        self.interrupted = interrupted;
    }
}
