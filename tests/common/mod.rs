//! Shared reference problems for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rksim::system::{ExplicitWrapper, ImplicitWrapper, Linear, Model, SemiExplicit, System};

/// Reference problem with a closed-form solution
pub struct Problem {
    pub name: &'static str,
    pub system: fn() -> System,
    pub x0: DVector<f64>,
    pub solution: fn(f64) -> DVector<f64>,
    pub t_span: (f64, f64),
}

/// Problems covering every system form, all with known solutions
pub fn reference_problems() -> Vec<Problem> {
    vec![
        // dx/dt = -x, x(t) = exp(-t)
        Problem {
            name: "decay_explicit",
            system: decay,
            x0: DVector::from_vec(vec![1.0]),
            solution: |t| DVector::from_vec(vec![(-t).exp()]),
            t_span: (0.0, 1.0),
        },
        // x' + x = 0 in residual form
        Problem {
            name: "decay_implicit",
            system: decay_implicit,
            x0: DVector::from_vec(vec![1.0]),
            solution: |t| DVector::from_vec(vec![(-t).exp()]),
            t_span: (0.0, 1.0),
        },
        // Harmonic oscillator, x(t) = (cos t, -sin t)
        Problem {
            name: "oscillator_explicit",
            system: oscillator,
            x0: DVector::from_vec(vec![1.0, 0.0]),
            solution: |t| DVector::from_vec(vec![t.cos(), -t.sin()]),
            t_span: (0.0, 2.0),
        },
        Problem {
            name: "oscillator_implicit",
            system: oscillator_implicit,
            x0: DVector::from_vec(vec![1.0, 0.0]),
            solution: |t| DVector::from_vec(vec![t.cos(), -t.sin()]),
            t_span: (0.0, 2.0),
        },
        // diag(2, 1) x' = diag(-2, -1) x
        Problem {
            name: "decay_linear",
            system: || System::linear(MassDecay),
            x0: DVector::from_vec(vec![1.0, 2.0]),
            solution: |t| DVector::from_vec(vec![(-t).exp(), 2.0 * (-t).exp()]),
            t_span: (0.0, 1.0),
        },
        // (1 + x^2) x' = -(1 + x^2) x
        Problem {
            name: "decay_semiexplicit",
            system: || System::semi_explicit(WeightedDecay),
            x0: DVector::from_vec(vec![1.0]),
            solution: |t| DVector::from_vec(vec![(-t).exp()]),
            t_span: (0.0, 1.0),
        },
    ]
}

pub fn decay() -> System {
    System::explicit(
        ExplicitWrapper::new("decay", 1, |x, _t| -x)
            .with_jacobian(|_x, _t| DMatrix::from_element(1, 1, -1.0)),
    )
}

pub fn decay_implicit() -> System {
    System::implicit(
        ImplicitWrapper::new("decay_implicit", 1, |x, x_dot, _t| x_dot + x).with_jacobians(
            |_x, _x_dot, _t| DMatrix::identity(1, 1),
            |_x, _x_dot, _t| DMatrix::identity(1, 1),
        ),
    )
}

pub fn oscillator() -> System {
    System::explicit(ExplicitWrapper::new("oscillator", 2, |x, _t| {
        DVector::from_vec(vec![x[1], -x[0]])
    }))
}

pub fn oscillator_implicit() -> System {
    System::implicit(ImplicitWrapper::new("oscillator_implicit", 2, |x, x_dot, _t| {
        DVector::from_vec(vec![x_dot[0] - x[1], x_dot[1] + x[0]])
    }))
}

/// `x' = x (1 - x)`, x(t) = 1 / (1 + exp(-t)) for x(0) = 1/2
pub fn logistic() -> System {
    System::explicit(
        ExplicitWrapper::new("logistic", 1, |x, _t| DVector::from_element(1, x[0] * (1.0 - x[0])))
            .with_jacobian(|x, _t| DMatrix::from_element(1, 1, 1.0 - 2.0 * x[0])),
    )
}

/// `x' = 0`
pub fn constant(equations: usize) -> System {
    System::explicit(ExplicitWrapper::new("constant", equations, move |_x, _t| {
        DVector::zeros(equations)
    }))
}

pub fn constant_implicit(equations: usize) -> System {
    System::implicit(
        ImplicitWrapper::new("constant_implicit", equations, |_x, x_dot, _t| x_dot.clone())
            .with_jacobians(
                move |_x, _x_dot, _t| DMatrix::zeros(equations, equations),
                move |_x, _x_dot, _t| DMatrix::identity(equations, equations),
            ),
    )
}

/// Unit-length pendulum in Cartesian coordinates `(x, y, u, v)`
///
/// The tension is eliminated analytically, so only the position constraint
/// `x^2 + y^2 = 1` drifts under integration.
pub fn pendulum() -> System {
    let g = 9.81;
    System::explicit(
        ExplicitWrapper::new("pendulum", 4, move |s, _t| {
            let (x, y, u, v) = (s[0], s[1], s[2], s[3]);
            let lambda = (u * u + v * v - g * y) / (x * x + y * y);
            DVector::from_vec(vec![u, v, -lambda * x, -lambda * y - g])
        })
        .with_invariants(1, |s, _t| DVector::from_element(1, s[0] * s[0] + s[1] * s[1] - 1.0))
        .with_invariants_jacobian(|s, _t| {
            DMatrix::from_row_slice(1, 4, &[2.0 * s[0], 2.0 * s[1], 0.0, 0.0])
        }),
    )
}

/// Decay that counts its right-hand side evaluations
pub fn counting_decay() -> (System, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let system = System::explicit(ExplicitWrapper::new("counting_decay", 1, move |x, _t| {
        counter.fetch_add(1, Ordering::Relaxed);
        -x
    }));
    (system, calls)
}

/// Largest absolute invariant value over a trajectory
pub fn max_drift(invariants: &[DVector<f64>]) -> f64 {
    invariants.iter().map(|h| h.amax()).fold(0.0, f64::max)
}

/// `E x' = A x` with `E = diag(2, 1)` and `A = diag(-2, -1)`
pub struct MassDecay;

impl Model for MassDecay {
    fn equations(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "mass_decay"
    }
}

impl Linear for MassDecay {
    fn mass(&self, _t: f64) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 1.0]))
    }

    fn stiffness(&self, _t: f64) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![-2.0, -1.0]))
    }

    fn forcing(&self, _t: f64) -> DVector<f64> {
        DVector::zeros(2)
    }
}

/// `(1 + x^2) x' = -(1 + x^2) x`
pub struct WeightedDecay;

impl Model for WeightedDecay {
    fn equations(&self) -> usize {
        1
    }
}

impl SemiExplicit for WeightedDecay {
    fn mass(&self, x: &DVector<f64>, _t: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, 1.0 + x[0] * x[0])
    }

    fn mass_jacobian(&self, x: &DVector<f64>, v: &DVector<f64>, _t: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, 2.0 * x[0] * v[0])
    }

    fn forcing(&self, x: &DVector<f64>, _t: f64) -> DVector<f64> {
        DVector::from_element(1, -(1.0 + x[0] * x[0]) * x[0])
    }

    fn forcing_jacobian(&self, x: &DVector<f64>, _t: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, -(1.0 + 3.0 * x[0] * x[0]))
    }
}

/// Index-1 DAE `x0' = -x0`, `0 = x0 - x1` with a singular mass matrix
///
/// Consistent from `x0 = [1, 1]`; both components follow `exp(-t)`.
pub struct LinearDae;

impl Model for LinearDae {
    fn equations(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "linear_dae"
    }
}

impl Linear for LinearDae {
    fn mass(&self, _t: f64) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 0.0]))
    }

    fn stiffness(&self, _t: f64) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 1.0, -1.0])
    }

    fn forcing(&self, _t: f64) -> DVector<f64> {
        DVector::zeros(2)
    }
}

/// [`LinearDae`] in semi-explicit form
pub struct SemiExplicitDae;

impl Model for SemiExplicitDae {
    fn equations(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "semiexplicit_dae"
    }
}

impl SemiExplicit for SemiExplicitDae {
    fn mass(&self, _x: &DVector<f64>, _t: f64) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 0.0]))
    }

    fn mass_jacobian(&self, _x: &DVector<f64>, _v: &DVector<f64>, _t: f64) -> DMatrix<f64> {
        DMatrix::zeros(2, 2)
    }

    fn forcing(&self, x: &DVector<f64>, _t: f64) -> DVector<f64> {
        DVector::from_vec(vec![-x[0], x[0] - x[1]])
    }

    fn forcing_jacobian(&self, _x: &DVector<f64>, _t: f64) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 1.0, -1.0])
    }
}

pub fn dae_systems() -> [fn() -> System; 2] {
    [|| System::linear(LinearDae), || System::semi_explicit(SemiExplicitDae)]
}
