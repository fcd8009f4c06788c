//! Explicit tableau tests
//!
//! Explicit tableaus on systems with an explicit form are evaluated in
//! closed form; on implicit systems every stage is a solve on dF/dx'.

mod common;

use std::sync::atomic::Ordering;

use approx::assert_relative_eq;
use common::*;
use nalgebra::DVector;
use rksim::prelude::*;

fn explicit_methods() -> Vec<Method> {
    Method::ALL
        .into_iter()
        .filter(|m| m.tableau().unwrap().is_explicit())
        .collect()
}

// ========================================================================================
// Dispatch
// ========================================================================================

#[test]
fn test_explicit_path_performs_no_solves() {
    for method in explicit_methods() {
        let mut rk = RungeKutta::from_method(method, oscillator()).unwrap();
        rk.disable_adaptive_mode();
        let solution = rk.solve(&DVector::from_vec(vec![1.0, 0.0]), 0.0, 1.0, 0.1).unwrap();

        let stats = solution.stats();
        assert_eq!(stats.stage_solves, 0, "{}", method.as_str());
        assert_eq!(stats.nonlinear_iterations, 0, "{}", method.as_str());
        assert_eq!(stats.jacobian_evaluations, 0, "{}", method.as_str());
        assert_eq!(stats.accepted_steps, 10, "{}", method.as_str());
    }
}

#[test]
fn test_explicit_path_rhs_evaluation_count() {
    let (system, calls) = counting_decay();
    let mut rk = RungeKutta::from_method(Method::RK4, system).unwrap();
    let solution = rk.solve(&DVector::from_element(1, 1.0), 0.0, 1.0, 0.1).unwrap();

    assert_eq!(solution.len(), 11);
    assert_eq!(calls.load(Ordering::Relaxed), 40);
    assert_eq!(solution.stats().function_evaluations, 40);
}

#[test]
fn test_step_info_reports_dispatch() {
    let mut rk = RungeKutta::from_method(Method::Heun3, decay()).unwrap();
    let result = rk.step(&DVector::from_element(1, 1.0), 0.0, 0.1).unwrap();

    assert!(result.accepted);
    assert_eq!(result.info.rk_type, RkType::Explicit);
    assert_eq!(result.info.stage_solves, 0);
    assert_eq!(result.info.rhs_evaluations, 3);
    assert!(result.info.error.is_none());
}

// ========================================================================================
// Accuracy
// ========================================================================================

#[test]
fn test_constant_solution_preserved() {
    // x' = 0 must be reproduced exactly by every tableau and both system forms
    let x0 = DVector::from_vec(vec![1.5, -2.0, 0.25]);
    for method in Method::ALL {
        for system in [constant(3), constant_implicit(3)] {
            let mut rk = RungeKutta::from_method(method, system).unwrap();
            rk.disable_adaptive_mode();
            let solution = rk.solve(&x0, 0.0, 1.0, 0.1).unwrap();

            assert_eq!(solution.final_state().unwrap(), &x0, "{}", method.as_str());
        }
    }
}

#[test]
fn test_rk4_oscillator() {
    let mut rk = RungeKutta::from_method(Method::RK4, oscillator()).unwrap();
    let solution = rk.solve(&DVector::from_vec(vec![1.0, 0.0]), 0.0, 2.0, 0.01).unwrap();

    let x = solution.final_state().unwrap();
    assert_relative_eq!(solution.final_time().unwrap(), 2.0);
    assert_relative_eq!(x[0], 2.0_f64.cos(), epsilon = 1e-8);
    assert_relative_eq!(x[1], -(2.0_f64.sin()), epsilon = 1e-8);
}

#[test]
fn test_explicit_tableau_on_implicit_system() {
    // Same tableau through the closed-form and the solve path
    let x0 = DVector::from_element(1, 1.0);

    let mut closed = RungeKutta::from_method(Method::RK4, decay()).unwrap();
    let reference = closed.solve(&x0, 0.0, 1.0, 0.05).unwrap();

    let mut solved = RungeKutta::from_method(Method::RK4, decay_implicit()).unwrap();
    let solution = solved.solve(&x0, 0.0, 1.0, 0.05).unwrap();

    assert_eq!(solution.len(), reference.len());
    assert!(solution.stats().stage_solves > 0);
    assert_relative_eq!(
        solution.final_state().unwrap()[0],
        reference.final_state().unwrap()[0],
        epsilon = 1e-10
    );
    assert_relative_eq!(solution.final_state().unwrap()[0], (-1.0_f64).exp(), epsilon = 1e-6);
}

#[test]
fn test_explicit_methods_reference_problems() {
    for problem in reference_problems() {
        for method in [Method::Heun2, Method::Ralston3, Method::SSPRK33, Method::RK4] {
            let mut rk = RungeKutta::from_method(method, (problem.system)()).unwrap();
            let (t0, t1) = problem.t_span;
            let solution = rk.solve(&problem.x0, t0, t1, 0.01).unwrap();

            let expected = (problem.solution)(t1);
            let error = (solution.final_state().unwrap() - &expected).amax();
            assert!(
                error < 1e-4,
                "{} on {}: error {:.3e}",
                method.as_str(),
                problem.name,
                error
            );
        }
    }
}
