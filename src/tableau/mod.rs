//! Butcher tableaus
//!
//! A [`Tableau`] is the immutable coefficient table `(A, b, c)` of a
//! Runge-Kutta method, optionally carrying embedded weights `b_hat` for
//! local error estimation. Tableaus are validated on construction and
//! classified once from the zero pattern of `A`.
//!
//! The catalog of constant methods lives in the [`explicit`], [`embedded`]
//! and [`implicit`] submodules and is enumerated by [`Method`].

pub mod embedded;
pub mod explicit;
pub mod implicit;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Tolerance for the consistency and weight-sum conditions
const CONSISTENCY_TOLERANCE: f64 = 1e-10;

/// Malformed tableau errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableauError {
    #[error("Tableau '{0}' has no stages")]
    Empty(String),

    #[error("Tableau '{name}': {what} has {found} entries, expected {expected}")]
    Dimension {
        name: String,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Tableau '{0}' contains non-finite coefficients")]
    NonFinite(String),

    #[error("Tableau '{name}': row {row} of A sums to {sum}, but c[{row}] = {c}")]
    Consistency {
        name: String,
        row: usize,
        sum: f64,
        c: f64,
    },

    #[error("Tableau '{name}': weights {which} sum to {sum}, expected 1")]
    Weights {
        name: String,
        which: &'static str,
        sum: f64,
    },
}

/// Stage coupling pattern of a Runge-Kutta method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RkType {
    /// Strictly lower-triangular `A`
    Explicit,
    /// Lower-triangular `A` with at least one nonzero diagonal entry
    DiagonallyImplicit,
    /// Any other pattern
    Implicit,
}

impl RkType {
    /// Classify a square coefficient matrix by its zero pattern
    pub fn classify(a: &DMatrix<f64>) -> Self {
        let s = a.nrows();
        let upper = (0..s).any(|i| (i + 1..s).any(|j| a[(i, j)] != 0.0));
        if upper {
            return RkType::Implicit;
        }
        if (0..s).any(|i| a[(i, i)] != 0.0) {
            RkType::DiagonallyImplicit
        } else {
            RkType::Explicit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RkType::Explicit => "ERK",
            RkType::DiagonallyImplicit => "DIRK",
            RkType::Implicit => "IRK",
        }
    }
}

/// Immutable Butcher tableau
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    name: String,
    a: DMatrix<f64>,
    b: DVector<f64>,
    b_hat: Option<DVector<f64>>,
    c: DVector<f64>,
    order: usize,
    order_hat: Option<usize>,
    rk_type: RkType,
}

impl Tableau {
    /// Create a tableau without embedded weights
    ///
    /// # Arguments
    /// * `name` - Display name of the method
    /// * `a` - Stage coupling matrix (S x S)
    /// * `b` - Update weights (S)
    /// * `c` - Stage nodes (S)
    /// * `order` - Accuracy order of the update
    pub fn new(
        name: impl Into<String>,
        a: DMatrix<f64>,
        b: DVector<f64>,
        c: DVector<f64>,
        order: usize,
    ) -> Result<Self, TableauError> {
        Self::build(name.into(), a, b, None, c, order, None)
    }

    /// Create an embedded pair
    ///
    /// # Arguments
    /// * `b_hat` - Embedded weights used for the local error estimate
    /// * `order_hat` - Accuracy order of the embedded solution
    pub fn embedded(
        name: impl Into<String>,
        a: DMatrix<f64>,
        b: DVector<f64>,
        b_hat: DVector<f64>,
        c: DVector<f64>,
        order: usize,
        order_hat: usize,
    ) -> Result<Self, TableauError> {
        Self::build(name.into(), a, b, Some(b_hat), c, order, Some(order_hat))
    }

    /// Create a tableau from ragged lower rows of `A` (row `i` lists `A[i, 0..=k]`)
    ///
    /// Rows may be shorter than `S`; missing entries are zero. This is the
    /// form the constant catalog is written in.
    pub fn from_rows(
        name: impl Into<String>,
        rows: &[&[f64]],
        b: &[f64],
        b_hat: Option<&[f64]>,
        c: &[f64],
        order: usize,
        order_hat: Option<usize>,
    ) -> Result<Self, TableauError> {
        let name = name.into();
        let s = b.len();
        if rows.len() != s {
            return Err(TableauError::Dimension {
                name,
                what: "A",
                expected: s,
                found: rows.len(),
            });
        }
        let mut a = DMatrix::zeros(s, s);
        for (i, row) in rows.iter().enumerate() {
            if row.len() > s {
                return Err(TableauError::Dimension {
                    name,
                    what: "row of A",
                    expected: s,
                    found: row.len(),
                });
            }
            for (j, &value) in row.iter().enumerate() {
                a[(i, j)] = value;
            }
        }
        Self::build(
            name,
            a,
            DVector::from_column_slice(b),
            b_hat.map(DVector::from_column_slice),
            DVector::from_column_slice(c),
            order,
            order_hat,
        )
    }

    fn build(
        name: String,
        a: DMatrix<f64>,
        b: DVector<f64>,
        b_hat: Option<DVector<f64>>,
        c: DVector<f64>,
        order: usize,
        order_hat: Option<usize>,
    ) -> Result<Self, TableauError> {
        let s = b.len();
        if s == 0 {
            return Err(TableauError::Empty(name));
        }

        let dimension = |what: &'static str, found: usize| TableauError::Dimension {
            name: name.clone(),
            what,
            expected: s,
            found,
        };
        if a.nrows() != s {
            return Err(dimension("rows of A", a.nrows()));
        }
        if a.ncols() != s {
            return Err(dimension("columns of A", a.ncols()));
        }
        if c.len() != s {
            return Err(dimension("c", c.len()));
        }
        if let Some(b_hat) = &b_hat {
            if b_hat.len() != s {
                return Err(dimension("b_hat", b_hat.len()));
            }
        }

        let finite = a.iter().chain(b.iter()).chain(c.iter()).all(|v| v.is_finite())
            && b_hat.as_ref().map_or(true, |bh| bh.iter().all(|v| v.is_finite()));
        if !finite {
            return Err(TableauError::NonFinite(name));
        }

        for i in 0..s {
            let sum = a.row(i).sum();
            if (sum - c[i]).abs() > CONSISTENCY_TOLERANCE * c[i].abs().max(1.0) {
                return Err(TableauError::Consistency {
                    name,
                    row: i,
                    sum,
                    c: c[i],
                });
            }
        }

        let weights = [("b", Some(&b)), ("b_hat", b_hat.as_ref())];
        for (which, w) in weights {
            if let Some(w) = w {
                let sum = w.sum();
                if (sum - 1.0).abs() > CONSISTENCY_TOLERANCE {
                    return Err(TableauError::Weights { name, which, sum });
                }
            }
        }

        let rk_type = RkType::classify(&a);
        Ok(Self {
            name,
            a,
            b,
            b_hat,
            c,
            order,
            order_hat,
            rk_type,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> usize {
        self.b.len()
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn b_hat(&self) -> Option<&DVector<f64>> {
        self.b_hat.as_ref()
    }

    pub fn c(&self) -> &DVector<f64> {
        &self.c
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn order_hat(&self) -> Option<usize> {
        self.order_hat
    }

    pub fn rk_type(&self) -> RkType {
        self.rk_type
    }

    pub fn is_embedded(&self) -> bool {
        self.b_hat.is_some()
    }

    pub fn is_explicit(&self) -> bool {
        self.rk_type == RkType::Explicit
    }

    pub fn is_diagonally_implicit(&self) -> bool {
        self.rk_type == RkType::DiagonallyImplicit
    }

    pub fn is_implicit(&self) -> bool {
        self.rk_type == RkType::Implicit
    }

    /// Order used by the step-size controller: the lower of the two orders of an embedded pair
    pub fn controller_order(&self) -> usize {
        match self.order_hat {
            Some(q) => q.min(self.order),
            None => self.order,
        }
    }

    /// Highest order (up to 4) whose Butcher conditions hold for `b`
    pub fn check_order(&self) -> usize {
        satisfied_order(&self.a, &self.b, &self.c)
    }

    /// Highest order (up to 4) whose Butcher conditions hold for `b_hat`
    pub fn check_order_hat(&self) -> Option<usize> {
        self.b_hat
            .as_ref()
            .map(|b_hat| satisfied_order(&self.a, b_hat, &self.c))
    }
}

/// Count the consecutive orders whose rooted-tree conditions are satisfied
fn satisfied_order(a: &DMatrix<f64>, b: &DVector<f64>, c: &DVector<f64>) -> usize {
    let tol = 1e-10;
    let close = |lhs: f64, rhs: f64| (lhs - rhs).abs() <= tol;

    let ac = a * c;
    let c2 = c.component_mul(c);
    let c3 = c2.component_mul(c);
    let ac2 = a * &c2;
    let aac = a * &ac;

    #[rustfmt::skip]
    let conditions: [&[(f64, f64)]; 4] = [
        &[(b.sum(), 1.0)],
        &[(b.dot(c), 1.0 / 2.0)],
        &[(b.dot(&c2), 1.0 / 3.0), (b.dot(&ac), 1.0 / 6.0)],
        &[
            (b.dot(&c3), 1.0 / 4.0),
            (b.dot(&c.component_mul(&ac)), 1.0 / 8.0),
            (b.dot(&ac2), 1.0 / 12.0),
            (b.dot(&aac), 1.0 / 24.0),
        ],
    ];

    conditions
        .iter()
        .take_while(|level| level.iter().all(|&(lhs, rhs)| close(lhs, rhs)))
        .count()
}

/// Catalog of built-in methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ExplicitEuler,
    Heun2,
    Ralston2,
    MTE22,
    SSPRK22,
    SSPRK22star,
    SSPRK42,
    Heun3,
    Ralston3,
    SSPRK33,
    SSPRK43,
    SSPRK93,
    SSPRK104,
    Chebyshev51,
    RK4,
    Ralston4,
    BogackiShampine32,
    Fehlberg45,
    DormandPrince54,
    ESDIRK32,
    ImplicitEuler,
    GaussLegendre2,
    GaussLegendre4,
    GaussLegendre6,
    RadauIIA3,
    RadauIIA5,
    LobattoIIIA2,
    SSPIRK33,
}

impl Method {
    pub const ALL: [Method; 28] = [
        Method::ExplicitEuler,
        Method::Heun2,
        Method::Ralston2,
        Method::MTE22,
        Method::SSPRK22,
        Method::SSPRK22star,
        Method::SSPRK42,
        Method::Heun3,
        Method::Ralston3,
        Method::SSPRK33,
        Method::SSPRK43,
        Method::SSPRK93,
        Method::SSPRK104,
        Method::Chebyshev51,
        Method::RK4,
        Method::Ralston4,
        Method::BogackiShampine32,
        Method::Fehlberg45,
        Method::DormandPrince54,
        Method::ESDIRK32,
        Method::ImplicitEuler,
        Method::GaussLegendre2,
        Method::GaussLegendre4,
        Method::GaussLegendre6,
        Method::RadauIIA3,
        Method::RadauIIA5,
        Method::LobattoIIIA2,
        Method::SSPIRK33,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::ExplicitEuler => "ExplicitEuler",
            Method::Heun2 => "Heun2",
            Method::Ralston2 => "Ralston2",
            Method::MTE22 => "MTE22",
            Method::SSPRK22 => "SSPRK22",
            Method::SSPRK22star => "SSPRK22star",
            Method::SSPRK42 => "SSPRK42",
            Method::Heun3 => "Heun3",
            Method::Ralston3 => "Ralston3",
            Method::SSPRK33 => "SSPRK33",
            Method::SSPRK43 => "SSPRK43",
            Method::SSPRK93 => "SSPRK93",
            Method::SSPRK104 => "SSPRK104",
            Method::Chebyshev51 => "Chebyshev51",
            Method::RK4 => "RK4",
            Method::Ralston4 => "Ralston4",
            Method::BogackiShampine32 => "BogackiShampine32",
            Method::Fehlberg45 => "Fehlberg45",
            Method::DormandPrince54 => "DormandPrince54",
            Method::ESDIRK32 => "ESDIRK32",
            Method::ImplicitEuler => "ImplicitEuler",
            Method::GaussLegendre2 => "GaussLegendre2",
            Method::GaussLegendre4 => "GaussLegendre4",
            Method::GaussLegendre6 => "GaussLegendre6",
            Method::RadauIIA3 => "RadauIIA3",
            Method::RadauIIA5 => "RadauIIA5",
            Method::LobattoIIIA2 => "LobattoIIIA2",
            Method::SSPIRK33 => "SSPIRK33",
        }
    }

    /// Build the tableau of this method
    pub fn tableau(&self) -> Result<Tableau, TableauError> {
        match self {
            Method::ExplicitEuler => explicit::explicit_euler(),
            Method::Heun2 => explicit::heun2(),
            Method::Ralston2 => explicit::ralston2(),
            Method::MTE22 => explicit::mte22(),
            Method::SSPRK22 => explicit::ssprk22(),
            Method::SSPRK22star => explicit::ssprk22star(),
            Method::SSPRK42 => explicit::ssprk42(),
            Method::Heun3 => explicit::heun3(),
            Method::Ralston3 => explicit::ralston3(),
            Method::SSPRK33 => explicit::ssprk33(),
            Method::SSPRK43 => explicit::ssprk43(),
            Method::SSPRK93 => explicit::ssprk93(),
            Method::SSPRK104 => explicit::ssprk104(),
            Method::Chebyshev51 => explicit::chebyshev51(),
            Method::RK4 => explicit::rk4(),
            Method::Ralston4 => explicit::ralston4(),
            Method::BogackiShampine32 => embedded::bogacki_shampine32(),
            Method::Fehlberg45 => embedded::fehlberg45(),
            Method::DormandPrince54 => embedded::dormand_prince54(),
            Method::ESDIRK32 => embedded::esdirk32(),
            Method::ImplicitEuler => implicit::implicit_euler(),
            Method::GaussLegendre2 => implicit::gauss_legendre2(),
            Method::GaussLegendre4 => implicit::gauss_legendre4(),
            Method::GaussLegendre6 => implicit::gauss_legendre6(),
            Method::RadauIIA3 => implicit::radau_iia3(),
            Method::RadauIIA5 => implicit::radau_iia5(),
            Method::LobattoIIIA2 => implicit::lobatto_iiia2(),
            Method::SSPIRK33 => implicit::sspirk33(),
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown method '{s}'"))
    }
}
