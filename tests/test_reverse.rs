//! Reverse-time integration tests

mod common;

use approx::assert_relative_eq;
use common::*;
use nalgebra::DVector;
use rksim::prelude::*;

#[test]
fn test_reverse_decay_recovers_initial_value() {
    let mut rk = RungeKutta::from_method(Method::DormandPrince54, decay()).unwrap();
    rk.enable_reverse_mode();
    let x1 = DVector::from_element(1, (-1.0_f64).exp());
    let solution = rk.solve(&x1, 1.0, 0.0, 0.1).unwrap();

    assert_eq!(solution.final_time(), Some(0.0));
    assert!(solution.times().windows(2).all(|w| w[1] < w[0]));
    assert!(solution.steps()[1..].iter().all(|&h| h < 0.0));
    assert_relative_eq!(solution.final_state().unwrap()[0], 1.0, epsilon = 1e-3);
}

#[test]
fn test_reverse_round_trip() {
    let x0 = DVector::from_vec(vec![1.0, 0.0]);
    let systems: [fn() -> System; 2] = [oscillator, oscillator_implicit];
    for system in systems {
        let mut rk = RungeKutta::from_method(Method::RK4, system()).unwrap();
        let forward = rk.solve(&x0, 0.0, 2.0, 0.01).unwrap();

        rk.enable_reverse_mode();
        let backward = rk.solve(forward.final_state().unwrap(), 2.0, 0.0, 0.01).unwrap();

        let x = backward.final_state().unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-8);
    }
}

#[test]
fn test_reverse_symmetric_method_is_exact() {
    // Gauss-Legendre is symmetric: stepping back with the same steps undoes the forward pass
    let x0 = DVector::from_vec(vec![1.0, 0.0]);
    let mut rk = RungeKutta::from_method(Method::GaussLegendre4, oscillator()).unwrap();
    let forward = rk.solve(&x0, 0.0, 1.0, 0.1).unwrap();

    rk.enable_reverse_mode();
    let backward = rk.solve(forward.final_state().unwrap(), 1.0, 0.0, 0.1).unwrap();

    let x = backward.final_state().unwrap();
    assert_relative_eq!(x[0], x0[0], epsilon = 1e-9);
    assert_relative_eq!(x[1], x0[1], epsilon = 1e-9);
}

#[test]
fn test_reverse_step_sign() {
    let mut rk = RungeKutta::from_method(Method::DormandPrince54, decay()).unwrap();
    rk.enable_reverse_mode();
    let x = DVector::from_element(1, 1.0);

    let result = rk.step(&x, 0.0, -0.1).unwrap();
    assert!(result.accepted);
    assert!(result.h_next < 0.0);
    assert_relative_eq!(result.x[0], 0.1_f64.exp(), epsilon = 1e-6);

    assert_eq!(rk.step(&x, 0.0, 0.1).unwrap_err(), IntegrationError::InvalidStep(0.1));
    assert!(matches!(
        rk.solve(&x, 0.0, 1.0, 0.1),
        Err(IntegrationError::InvalidTimeSpan { .. })
    ));
}

#[test]
fn test_reverse_implicit_tableau() {
    let mut rk = RungeKutta::from_method(Method::RadauIIA5, decay_implicit()).unwrap();
    rk.enable_reverse_mode();
    let x1 = DVector::from_element(1, (-1.0_f64).exp());
    let solution = rk.solve(&x1, 1.0, 0.0, 0.05).unwrap();

    assert_relative_eq!(solution.final_state().unwrap()[0], 1.0, epsilon = 1e-8);
}
