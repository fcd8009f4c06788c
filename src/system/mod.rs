//! System contract
//!
//! A dynamical model is one of four structural forms, each a capability
//! trait on top of [`Model`]:
//!
//! - [`Implicit`]: `F(x, x', t) = 0`
//! - [`Explicit`]: `x' = f(x, t)`
//! - [`SemiExplicit`]: `A(x, t) x' = b(x, t)`
//! - [`Linear`]: `E(t) x' = A(t) x + b(t)`
//!
//! The engine only sees the tagged [`System`] enum, which exposes every
//! form through the implicit residual and, where one exists, through the
//! explicit right-hand side. Reverse-time variants evaluate the system in
//! the reflected time `tau = -t`.

mod wrapper;

pub use wrapper::{ExplicitWrapper, ImplicitWrapper};

use nalgebra::{DMatrix, DVector};

use crate::optim::DenseLu;

/// Capabilities shared by every system form
pub trait Model: Send + Sync {
    /// Number of states `N`
    fn equations(&self) -> usize;

    /// Number of invariants `M`
    fn num_invariants(&self) -> usize {
        0
    }

    /// Invariants `H(x, t)`, length `M`
    fn invariants(&self, _x: &DVector<f64>, _t: f64) -> DVector<f64> {
        DVector::zeros(0)
    }

    /// Invariant Jacobian `dH/dx`, `M x N`
    fn invariants_jacobian(&self, x: &DVector<f64>, _t: f64) -> DMatrix<f64> {
        DMatrix::zeros(0, x.len())
    }

    /// Whether `(x, t)` lies inside the model's domain of validity
    fn in_domain(&self, _x: &DVector<f64>, _t: f64) -> bool {
        true
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// Fully implicit system `F(x, x', t) = 0`
pub trait Implicit: Model {
    fn residual(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DVector<f64>;

    /// `dF/dx`
    fn jacobian_x(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DMatrix<f64>;

    /// `dF/dx'`
    fn jacobian_x_dot(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DMatrix<f64>;
}

/// Explicit system `x' = f(x, t)`
pub trait Explicit: Model {
    fn rhs(&self, x: &DVector<f64>, t: f64) -> DVector<f64>;

    /// `df/dx`
    fn rhs_jacobian(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64>;
}

/// Semi-explicit system `A(x, t) x' = b(x, t)`
pub trait SemiExplicit: Model {
    /// Mass matrix `A(x, t)`
    fn mass(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64>;

    /// Derivative of the product `A(x, t) v` with respect to `x`
    fn mass_jacobian(&self, x: &DVector<f64>, v: &DVector<f64>, t: f64) -> DMatrix<f64>;

    /// Forcing `b(x, t)`
    fn forcing(&self, x: &DVector<f64>, t: f64) -> DVector<f64>;

    /// `db/dx`
    fn forcing_jacobian(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64>;
}

/// Linear system `E(t) x' = A(t) x + b(t)`
pub trait Linear: Model {
    fn mass(&self, t: f64) -> DMatrix<f64>;

    fn stiffness(&self, t: f64) -> DMatrix<f64>;

    fn forcing(&self, t: f64) -> DVector<f64>;
}

/// Structural form of a [`System`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    Implicit,
    Explicit,
    SemiExplicit,
    Linear,
}

/// Tagged system handed to the integrator
pub enum System {
    Implicit(Box<dyn Implicit>),
    Explicit(Box<dyn Explicit>),
    SemiExplicit(Box<dyn SemiExplicit>),
    Linear(Box<dyn Linear>),
}

macro_rules! on_model {
    ($self:ident, $s:ident => $body:expr) => {
        match $self {
            System::Implicit($s) => $body,
            System::Explicit($s) => $body,
            System::SemiExplicit($s) => $body,
            System::Linear($s) => $body,
        }
    };
}

impl System {
    pub fn implicit(system: impl Implicit + 'static) -> Self {
        System::Implicit(Box::new(system))
    }

    pub fn explicit(system: impl Explicit + 'static) -> Self {
        System::Explicit(Box::new(system))
    }

    pub fn semi_explicit(system: impl SemiExplicit + 'static) -> Self {
        System::SemiExplicit(Box::new(system))
    }

    pub fn linear(system: impl Linear + 'static) -> Self {
        System::Linear(Box::new(system))
    }

    pub fn kind(&self) -> SystemKind {
        match self {
            System::Implicit(_) => SystemKind::Implicit,
            System::Explicit(_) => SystemKind::Explicit,
            System::SemiExplicit(_) => SystemKind::SemiExplicit,
            System::Linear(_) => SystemKind::Linear,
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.kind() == SystemKind::Implicit
    }

    pub fn is_explicit(&self) -> bool {
        self.kind() == SystemKind::Explicit
    }

    pub fn is_semiexplicit(&self) -> bool {
        self.kind() == SystemKind::SemiExplicit
    }

    pub fn is_linear(&self) -> bool {
        self.kind() == SystemKind::Linear
    }

    /// Whether the form admits `x' = f(x, t)` in closed form
    ///
    /// Mass-matrix forms still lack one wherever the mass matrix is singular;
    /// see [`System::rhs`].
    pub fn has_explicit_form(&self) -> bool {
        !self.is_implicit()
    }

    pub fn name(&self) -> &str {
        on_model!(self, s => s.name())
    }

    pub fn equations(&self) -> usize {
        on_model!(self, s => s.equations())
    }

    pub fn num_invariants(&self) -> usize {
        on_model!(self, s => s.num_invariants())
    }

    pub fn invariants(&self, x: &DVector<f64>, t: f64) -> DVector<f64> {
        on_model!(self, s => s.invariants(x, t))
    }

    pub fn invariants_jacobian(&self, x: &DVector<f64>, t: f64) -> DMatrix<f64> {
        on_model!(self, s => s.invariants_jacobian(x, t))
    }

    pub fn in_domain(&self, x: &DVector<f64>, t: f64) -> bool {
        on_model!(self, s => s.in_domain(x, t))
    }

    /// Implicit residual `F(x, x', t)`
    pub fn residual(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DVector<f64> {
        match self {
            System::Implicit(s) => s.residual(x, x_dot, t),
            System::Explicit(s) => x_dot - s.rhs(x, t),
            System::SemiExplicit(s) => s.mass(x, t) * x_dot - s.forcing(x, t),
            System::Linear(s) => s.mass(t) * x_dot - s.stiffness(t) * x - s.forcing(t),
        }
    }

    /// `dF/dx`
    pub fn jacobian_x(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match self {
            System::Implicit(s) => s.jacobian_x(x, x_dot, t),
            System::Explicit(s) => -s.rhs_jacobian(x, t),
            System::SemiExplicit(s) => s.mass_jacobian(x, x_dot, t) - s.forcing_jacobian(x, t),
            System::Linear(s) => -s.stiffness(t),
        }
    }

    /// `dF/dx'`
    pub fn jacobian_x_dot(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match self {
            System::Implicit(s) => s.jacobian_x_dot(x, x_dot, t),
            System::Explicit(_) => DMatrix::identity(x.len(), x.len()),
            System::SemiExplicit(s) => s.mass(x, t),
            System::Linear(s) => s.mass(t),
        }
    }

    /// Explicit right-hand side `f(x, t)`
    ///
    /// Returns `None` for implicit systems and for mass-matrix forms whose
    /// mass matrix is singular at `(x, t)`; the latter are DAEs whose stages
    /// must go through the implicit residual.
    pub fn rhs(&self, x: &DVector<f64>, t: f64) -> Option<DVector<f64>> {
        match self {
            System::Implicit(_) => None,
            System::Explicit(s) => Some(s.rhs(x, t)),
            System::SemiExplicit(s) => DenseLu::new(s.mass(x, t))?.solve(&s.forcing(x, t)),
            System::Linear(s) => DenseLu::new(s.mass(t))?.solve(&(s.stiffness(t) * x + s.forcing(t))),
        }
    }

    /// Explicit right-hand side Jacobian `df/dx`, `None` where [`System::rhs`] is
    pub fn rhs_jacobian(&self, x: &DVector<f64>, t: f64) -> Option<DMatrix<f64>> {
        match self {
            System::Implicit(_) => None,
            System::Explicit(s) => Some(s.rhs_jacobian(x, t)),
            System::SemiExplicit(s) => {
                let lu = DenseLu::new(s.mass(x, t))?;
                let f = lu.solve(&s.forcing(x, t))?;
                lu.solve_matrix(&(s.forcing_jacobian(x, t) - s.mass_jacobian(x, &f, t)))
            }
            System::Linear(s) => DenseLu::new(s.mass(t))?.solve_matrix(&s.stiffness(t)),
        }
    }

    /// Reverse-time residual `-F(x, -x', -t)`
    pub fn residual_reverse(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DVector<f64> {
        -self.residual(x, &-x_dot, -t)
    }

    /// Reverse-time `dF/dx`: `-dF/dx(x, -x', -t)`
    pub fn jacobian_x_reverse(&self, x: &DVector<f64>, x_dot: &DVector<f64>, t: f64) -> DMatrix<f64> {
        -self.jacobian_x(x, &-x_dot, -t)
    }

    /// Reverse-time `dF/dx'`: `dF/dx'(x, -x', -t)`
    pub fn jacobian_x_dot_reverse(
        &self,
        x: &DVector<f64>,
        x_dot: &DVector<f64>,
        t: f64,
    ) -> DMatrix<f64> {
        self.jacobian_x_dot(x, &-x_dot, -t)
    }

    /// Reverse-time right-hand side `-f(x, -t)`
    pub fn rhs_reverse(&self, x: &DVector<f64>, t: f64) -> Option<DVector<f64>> {
        self.rhs(x, -t).map(|f| -f)
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("equations", &self.equations())
            .field("invariants", &self.num_invariants())
            .finish()
    }
}
