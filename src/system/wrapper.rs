//! Closure-backed systems
//!
//! Wrappers build an [`Explicit`] or [`Implicit`] system from plain
//! closures. Jacobians that are not supplied are approximated with central
//! finite differences.

use nalgebra::{DMatrix, DVector};

use super::{Explicit, Implicit, Model};
use crate::optim::numerical_jacobian;

type VecFn = Box<dyn Fn(&DVector<f64>, f64) -> DVector<f64> + Send + Sync>;
type MatFn = Box<dyn Fn(&DVector<f64>, f64) -> DMatrix<f64> + Send + Sync>;
type ResidualFn = Box<dyn Fn(&DVector<f64>, &DVector<f64>, f64) -> DVector<f64> + Send + Sync>;
type ResidualJacFn = Box<dyn Fn(&DVector<f64>, &DVector<f64>, f64) -> DMatrix<f64> + Send + Sync>;
type DomainFn = Box<dyn Fn(&DVector<f64>, f64) -> bool + Send + Sync>;

/// Optional invariants and domain shared by both wrappers
#[derive(Default)]
struct Constraints {
    count: usize,
    invariants: Option<VecFn>,
    jacobian: Option<MatFn>,
    domain: Option<DomainFn>,
}

impl Constraints {
    fn invariants(&self, x: &DVector<f64>, t: f64) -> DVector<f64> {
        match &self.invariants {
            Some(h) => h(x, t),
            None => DVector::zeros(0),
        }
    }

    fn jacobian(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match (&self.jacobian, &self.invariants) {
            (Some(jh), _) => jh(x, t),
            (None, Some(h)) => numerical_jacobian(&|y: &DVector<f64>| h(y, t), x),
            (None, None) => DMatrix::zeros(0, x.len()),
        }
    }

    fn in_domain(&self, x: &DVector<f64>, t: f64) -> bool {
        self.domain.as_ref().map_or(true, |d| d(x, t))
    }
}

/// Explicit system `x' = f(x, t)` assembled from closures
///
/// # Example
///
/// ```rust
/// use nalgebra::DVector;
/// use rksim::system::{ExplicitWrapper, System};
///
/// let decay = ExplicitWrapper::new("decay", 1, |x, _t| -x);
/// let system = System::explicit(decay);
/// assert_eq!(system.equations(), 1);
/// ```
pub struct ExplicitWrapper {
    name: String,
    equations: usize,
    rhs: VecFn,
    jacobian: Option<MatFn>,
    constraints: Constraints,
}

impl ExplicitWrapper {
    pub fn new<F>(name: impl Into<String>, equations: usize, rhs: F) -> Self
    where
        F: Fn(&DVector<f64>, f64) -> DVector<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            equations,
            rhs: Box::new(rhs),
            jacobian: None,
            constraints: Constraints::default(),
        }
    }

    /// Supply the analytic Jacobian `df/dx`
    pub fn with_jacobian<J>(mut self, jacobian: J) -> Self
    where
        J: Fn(&DVector<f64>, f64) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.jacobian = Some(Box::new(jacobian));
        self
    }

    /// Attach `count` invariants `H(x, t)`
    pub fn with_invariants<H>(mut self, count: usize, invariants: H) -> Self
    where
        H: Fn(&DVector<f64>, f64) -> DVector<f64> + Send + Sync + 'static,
    {
        self.constraints.count = count;
        self.constraints.invariants = Some(Box::new(invariants));
        self
    }

    /// Supply the analytic invariant Jacobian `dH/dx`
    pub fn with_invariants_jacobian<J>(mut self, jacobian: J) -> Self
    where
        J: Fn(&DVector<f64>, f64) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.constraints.jacobian = Some(Box::new(jacobian));
        self
    }

    pub fn with_domain<D>(mut self, domain: D) -> Self
    where
        D: Fn(&DVector<f64>, f64) -> bool + Send + Sync + 'static,
    {
        self.constraints.domain = Some(Box::new(domain));
        self
    }
}

impl Model for ExplicitWrapper {
    fn equations(&self) -> usize {
        self.equations
    }

    fn num_invariants(&self) -> usize {
        self.constraints.count
    }

    fn invariants(&self, x: &DVector<f64>, t: f64) -> DVector<f64> {
        self.constraints.invariants(x, t)
    }

    fn invariants_jacobian(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64> {
        self.constraints.jacobian(x, t)
    }

    fn in_domain(&self, x: &DVector<f64>, t: f64) -> bool {
        self.constraints.in_domain(x, t)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Explicit for ExplicitWrapper {
    fn rhs(&self, x: &DVector<f64>, t: f64) -> DVector<f64> {
        (self.rhs)(x, t)
    }

    fn rhs_jacobian(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match &self.jacobian {
            Some(jac) => jac(x, t),
            None => numerical_jacobian(&|y: &DVector<f64>| (self.rhs)(y, t), x),
        }
    }
}

/// Implicit system `F(x, x', t) = 0` assembled from closures
pub struct ImplicitWrapper {
    name: String,
    equations: usize,
    residual: ResidualFn,
    jacobian_x: Option<ResidualJacFn>,
    jacobian_x_dot: Option<ResidualJacFn>,
    constraints: Constraints,
}

impl ImplicitWrapper {
    pub fn new<F>(name: impl Into<String>, equations: usize, residual: F) -> Self
    where
        F: Fn(&DVector<f64>, &DVector<f64>, f64) -> DVector<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            equations,
            residual: Box::new(residual),
            jacobian_x: None,
            jacobian_x_dot: None,
            constraints: Constraints::default(),
        }
    }

    /// Supply the analytic Jacobians `dF/dx` and `dF/dx'`
    pub fn with_jacobians<JX, JXD>(mut self, jacobian_x: JX, jacobian_x_dot: JXD) -> Self
    where
        JX: Fn(&DVector<f64>, &DVector<f64>, f64) -> DMatrix<f64> + Send + Sync + 'static,
        JXD: Fn(&DVector<f64>, &DVector<f64>, f64) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.jacobian_x = Some(Box::new(jacobian_x));
        self.jacobian_x_dot = Some(Box::new(jacobian_x_dot));
        self
    }

    /// Attach `count` invariants `H(x, t)`
    pub fn with_invariants<H>(mut self, count: usize, invariants: H) -> Self
    where
        H: Fn(&DVector<f64>, f64) -> DVector<f64> + Send + Sync + 'static,
    {
        self.constraints.count = count;
        self.constraints.invariants = Some(Box::new(invariants));
        self
    }

    pub fn with_invariants_jacobian<J>(mut self, jacobian: J) -> Self
    where
        J: Fn(&DVector<f64>, f64) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.constraints.jacobian = Some(Box::new(jacobian));
        self
    }

    pub fn with_domain<D>(mut self, domain: D) -> Self
    where
        D: Fn(&DVector<f64>, f64) -> bool + Send + Sync + 'static,
    {
        self.constraints.domain = Some(Box::new(domain));
        self
    }
}

impl Model for ImplicitWrapper {
    fn equations(&self) -> usize {
        self.equations
    }

    fn num_invariants(&self) -> usize {
        self.constraints.count
    }

    fn invariants(&self, x: &DVector<f64>, t: f64) -> DVector<f64> {
        self.constraints.invariants(x, t)
    }

    fn invariants_jacobian(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64> {
        self.constraints.jacobian(x, t)
    }

    fn in_domain(&self, x: &DVector<f64>, t: f64) -> bool {
        self.constraints.in_domain(x, t)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Implicit for ImplicitWrapper {
    fn residual(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DVector<f64> {
        (self.residual)(x, x_dot, t)
    }

    fn jacobian_x(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match &self.jacobian_x {
            Some(jac) => jac(x, x_dot, t),
            None => numerical_jacobian(&|y: &DVector<f64>| (self.residual)(y, x_dot, t), x),
        }
    }

    fn jacobian_x_dot(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match &self.jacobian_x_dot {
            Some(jac) => jac(x, x_dot, t),
            None => numerical_jacobian(&|y: &DVector<f64>| (self.residual)(x, y, t), x_dot),
        }
    }
}
