//! Implicit tableau tests
//!
//! Diagonally implicit tableaus solve one stage at a time, fully implicit
//! ones solve all stages jointly. Both are checked against closed-form
//! solutions on every system form.

mod common;

use approx::assert_relative_eq;
use common::*;
use nalgebra::DVector;
use rksim::prelude::*;

fn implicit_methods() -> Vec<Method> {
    Method::ALL
        .into_iter()
        .filter(|m| !m.tableau().unwrap().is_explicit())
        .collect()
}

// ========================================================================================
// Accuracy
// ========================================================================================

#[test]
fn test_implicit_methods_reference_problems() {
    let h: f64 = 0.01;
    for method in implicit_methods() {
        let order = method.tableau().unwrap().order() as i32;
        let tolerance = (10.0 * h.powi(order)).max(1e-7);

        for problem in reference_problems() {
            let mut rk = RungeKutta::from_method(method, (problem.system)()).unwrap();
            rk.disable_adaptive_mode();
            let (t0, t1) = problem.t_span;
            let solution = rk.solve(&problem.x0, t0, t1, h).unwrap();

            let expected = (problem.solution)(t1);
            let error = (solution.final_state().unwrap() - &expected).amax();
            assert!(
                error < tolerance,
                "{} on {}: error {:.3e} >= {:.3e}",
                method.as_str(),
                problem.name,
                error,
                tolerance
            );
        }
    }
}

#[test]
fn test_dirk_dispatch() {
    let mut rk = RungeKutta::from_method(Method::SSPIRK33, decay()).unwrap();
    let result = rk.step(&DVector::from_element(1, 1.0), 0.0, 0.1).unwrap();

    assert!(result.accepted);
    assert_eq!(result.info.rk_type, RkType::DiagonallyImplicit);
    assert_eq!(result.info.stage_solves, 3);
}

#[test]
fn test_irk_dispatch() {
    let mut rk = RungeKutta::from_method(Method::RadauIIA5, oscillator_implicit()).unwrap();
    let result = rk.step(&DVector::from_vec(vec![1.0, 0.0]), 0.0, 0.1).unwrap();

    assert!(result.accepted);
    assert_eq!(result.info.rk_type, RkType::Implicit);
    assert_eq!(result.info.stage_solves, 1);
    assert!(result.info.nonlinear.converged);
    assert_relative_eq!(result.x[0], 0.1_f64.cos(), epsilon = 1e-9);
    assert_relative_eq!(result.x[1], -(0.1_f64.sin()), epsilon = 1e-9);
}

#[test]
fn test_esdirk_explicit_first_stage_in_closed_form() {
    // The explicit first stage of ESDIRK32 needs no solve on an explicit system
    let mut rk = RungeKutta::from_method(Method::ESDIRK32, decay()).unwrap();
    rk.disable_adaptive_mode();
    let result = rk.step(&DVector::from_element(1, 1.0), 0.0, 0.1).unwrap();

    assert_eq!(result.info.stage_solves, 3);
    assert!(result.info.rhs_evaluations >= 1);
    assert!(result.info.error.is_some());
}

#[test]
fn test_stiff_decay_stays_bounded() {
    // x' = -1000 (x - cos t): L-stable methods track the slow manifold with large steps
    let system = System::explicit(ExplicitWrapper::new("stiff", 1, |x, t| {
        DVector::from_element(1, -1000.0 * (x[0] - t.cos()))
    }));
    let mut rk = RungeKutta::from_method(Method::RadauIIA5, system).unwrap();
    rk.disable_adaptive_mode();
    let solution = rk.solve(&DVector::from_element(1, 0.0), 0.0, 1.0, 0.1).unwrap();

    let x1 = solution.final_state().unwrap()[0];
    // Slow manifold x = cos t + sin t / 1000 up to O(1e-6)
    assert_relative_eq!(x1, 1.0_f64.cos(), epsilon = 2e-3);
}

// ========================================================================================
// Stage solvers
// ========================================================================================

#[test]
fn test_broyden_matches_newton() {
    let x0 = DVector::from_element(1, 0.5);

    let mut newton = RungeKutta::from_method(Method::ESDIRK32, logistic()).unwrap();
    newton.disable_adaptive_mode();
    let newton_solution = newton.solve(&x0, 0.0, 2.0, 0.05).unwrap();

    let mut broyden = RungeKutta::from_method(Method::ESDIRK32, logistic()).unwrap();
    broyden.disable_adaptive_mode();
    broyden.set_solver_choice(SolverChoice::Broyden);
    let broyden_solution = broyden.solve(&x0, 0.0, 2.0, 0.05).unwrap();

    assert_relative_eq!(
        newton_solution.final_state().unwrap()[0],
        broyden_solution.final_state().unwrap()[0],
        epsilon = 1e-8
    );
    assert_relative_eq!(
        broyden_solution.final_state().unwrap()[0],
        1.0 / (1.0 + (-2.0_f64).exp()),
        epsilon = 1e-4
    );
    assert!(
        broyden_solution.stats().jacobian_evaluations < newton_solution.stats().jacobian_evaluations,
        "Broyden {} vs Newton {}",
        broyden_solution.stats().jacobian_evaluations,
        newton_solution.stats().jacobian_evaluations
    );
}

#[test]
fn test_broyden_modes_integrate() {
    for mode in [BroydenMode::Good, BroydenMode::Bad, BroydenMode::Combined] {
        let mut rk = RungeKutta::from_method(Method::GaussLegendre4, oscillator_implicit()).unwrap();
        rk.set_solver_choice(SolverChoice::Broyden);
        rk.set_broyden_mode(mode);
        let solution = rk.solve(&DVector::from_vec(vec![1.0, 0.0]), 0.0, 1.0, 0.05).unwrap();

        let x = solution.final_state().unwrap();
        assert_relative_eq!(x[0], 1.0_f64.cos(), epsilon = 1e-7);
        assert_relative_eq!(x[1], -(1.0_f64.sin()), epsilon = 1e-7);
    }
}

#[test]
fn test_solver_choice_reported() {
    let mut rk = RungeKutta::from_method(Method::RadauIIA3, decay()).unwrap();
    assert!(rk.info().contains("Newton"));

    rk.set_solver_choice(SolverChoice::Broyden);
    assert_eq!(rk.solver_choice(), SolverChoice::Broyden);
    assert!(rk.info().contains("Broyden"));
    assert!(rk.info().contains("RadauIIA3"));
}

#[test]
fn test_stage_failure_is_retried() {
    // A singular dF/dx' makes the explicit-tableau stage solve fail on every attempt
    let system = System::implicit(
        ImplicitWrapper::new("singular", 1, |x, _x_dot, _t| x.clone()).with_jacobians(
            |_x, _x_dot, _t| nalgebra::DMatrix::identity(1, 1),
            |_x, _x_dot, _t| nalgebra::DMatrix::zeros(1, 1),
        ),
    );
    let mut rk = RungeKutta::from_method(Method::RK4, system).unwrap();
    let result = rk.step(&DVector::from_element(1, 1.0), 0.0, 0.1).unwrap();

    assert!(!result.accepted);
    assert_relative_eq!(result.h_next, 0.05);
    assert!(matches!(
        result.info.failure,
        Some(StepFailure::Stage(NonlinearError::SingularJacobian { .. }))
    ));

    match rk.advance(&DVector::from_element(1, 1.0), 0.0, 0.1) {
        Err(IntegrationError::StepSizeUnderflow { cause, .. }) => {
            assert!(matches!(cause, StepFailure::Stage(_)));
        }
        other => panic!("expected underflow, got {:?}", other),
    }
}

// ========================================================================================
// Index-1 DAEs with a singular mass matrix
// ========================================================================================

#[test]
fn test_dae_single_step_accepted() {
    let x0 = DVector::from_vec(vec![1.0, 1.0]);
    for system in dae_systems() {
        for method in [Method::ImplicitEuler, Method::RadauIIA5] {
            let mut rk = RungeKutta::from_method(method, system()).unwrap();
            let result = rk.step(&x0, 0.0, 0.1).unwrap();

            assert!(result.accepted, "{}: {:?}", method.as_str(), result.info.failure);
            assert!(result.info.failure.is_none());
            assert_eq!(result.info.rhs_evaluations, 0);
            assert!(result.info.stage_solves > 0);
        }
    }
}

#[test]
fn test_dae_implicit_tableaus() {
    let x0 = DVector::from_vec(vec![1.0, 1.0]);
    let cases = [
        // ImplicitEuler goes through the diagonally implicit path
        (Method::ImplicitEuler, 1e-3, 1e-3),
        (Method::RadauIIA3, 1e-2, 1e-7),
        (Method::RadauIIA5, 5e-2, 1e-9),
        (Method::GaussLegendre4, 1e-2, 1e-9),
    ];

    for system in dae_systems() {
        for (method, h, epsilon) in cases {
            let mut rk = RungeKutta::from_method(method, system()).unwrap();
            let solution = rk.solve(&x0, 0.0, 1.0, h).unwrap();

            assert_eq!(solution.final_time(), Some(1.0));
            for (t, x) in solution.times().iter().zip(solution.states()) {
                let exact = (-t).exp();
                assert_relative_eq!(x[0], exact, epsilon = epsilon);
                assert_relative_eq!(x[1], exact, epsilon = epsilon);
                // Algebraic equation
                assert_relative_eq!(x[0], x[1], epsilon = 1e-8);
            }
        }
    }
}

#[test]
fn test_dae_explicit_first_stage_fails() {
    // The explicit first stage of ESDIRK32 cannot resolve the algebraic component
    let mut rk = RungeKutta::from_method(Method::ESDIRK32, System::linear(LinearDae)).unwrap();
    let result = rk.step(&DVector::from_vec(vec![1.0, 1.0]), 0.0, 0.1).unwrap();

    assert!(!result.accepted);
    assert!(matches!(
        result.info.failure,
        Some(StepFailure::Stage(NonlinearError::SingularJacobian { .. }))
    ));
}
