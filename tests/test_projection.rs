//! Invariant projection tests on the Cartesian pendulum

mod common;

use approx::assert_relative_eq;
use common::*;
use nalgebra::DVector;
use rksim::prelude::*;

fn pendulum_rk(projection: bool) -> RungeKutta {
    let mut rk = RungeKutta::from_method(Method::DormandPrince54, pendulum()).unwrap();
    rk.set_absolute_tolerance(1e-6).unwrap();
    rk.set_relative_tolerance(1e-6).unwrap();
    if projection {
        rk.enable_projection();
    } else {
        rk.disable_projection();
    }
    rk
}

fn pendulum_x0() -> DVector<f64> {
    DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0])
}

#[test]
fn test_projection_keeps_constraint() {
    let mut free = pendulum_rk(false);
    let drifted = free.solve(&pendulum_x0(), 0.0, 5.0, 1e-2).unwrap();

    let mut projected = pendulum_rk(true);
    let kept = projected.solve(&pendulum_x0(), 0.0, 5.0, 1e-2).unwrap();

    let drift_free = max_drift(drifted.invariants());
    let drift_projected = max_drift(kept.invariants());

    assert!(drift_free > 1e-6, "unprojected drift {drift_free:.3e}");
    assert!(drift_projected < 1e-9, "projected drift {drift_projected:.3e}");
    assert_eq!(kept.stats().projection_failures, 0);
    assert_eq!(kept.final_time(), Some(5.0));
}

#[test]
fn test_projection_idempotent() {
    let rk = pendulum_rk(true);
    let x = DVector::from_vec(vec![0.8, -0.7, 0.3, 0.1]);

    let once = rk.project(&x, 0.0);
    let twice = rk.project(&once.x, 0.0);

    assert!(once.converged);
    assert!(twice.converged);
    assert_eq!(twice.iterations, 0);
    assert_eq!(once.x, twice.x);
    // Velocities are not constrained
    assert_relative_eq!(once.x[2], 0.3, epsilon = 1e-15);
    assert_relative_eq!(once.x[3], 0.1, epsilon = 1e-15);
}

#[test]
fn test_projection_is_closest_point() {
    // The nearest point on the unit circle lies on the same ray
    let rk = pendulum_rk(true);
    let projection = rk.project(&DVector::from_vec(vec![0.6, -0.9, 0.0, 0.0]), 0.0);

    let norm = (0.6_f64 * 0.6 + 0.9 * 0.9).sqrt();
    assert!(projection.converged);
    assert_relative_eq!(projection.x[0], 0.6 / norm, epsilon = 1e-8);
    assert_relative_eq!(projection.x[1], -0.9 / norm, epsilon = 1e-8);
}

#[test]
fn test_project_initial_conditions() {
    let rk = pendulum_rk(true);
    let x = DVector::from_vec(vec![0.6, -0.9, 0.0, 0.0]);

    // Only y may move
    let projection = rk.project_ics(&x, 0.0, &[1], &[0]).unwrap();
    assert!(projection.converged);
    assert_eq!(projection.x[0], 0.6);
    assert_relative_eq!(projection.x[1], -0.8, epsilon = 1e-9);

    // No selected invariants leaves the state untouched
    let untouched = rk.project_ics(&x, 0.0, &[0, 1], &[]).unwrap();
    assert!(untouched.converged);
    assert_eq!(untouched.x, x);

    assert!(matches!(
        rk.project_ics(&x, 0.0, &[4], &[0]),
        Err(IntegrationError::IndexOutOfRange { index: 4, len: 4 })
    ));
}

#[test]
fn test_projection_without_invariants_is_identity() {
    let rk = RungeKutta::from_method(Method::RK4, oscillator()).unwrap();
    let x = DVector::from_vec(vec![0.3, 0.4]);
    let projection = rk.project(&x, 0.0);

    assert!(projection.converged);
    assert_eq!(projection.x, x);
}

#[test]
fn test_accepted_steps_are_projected() {
    let mut rk = pendulum_rk(true);
    let result = rk.step(&pendulum_x0(), 0.0, 0.01).unwrap();

    assert!(result.accepted);
    assert!(!result.info.projection_failed);
    let h = result.x[0] * result.x[0] + result.x[1] * result.x[1] - 1.0;
    assert!(h.abs() < 1e-10);
}
