//! Implicit Runge-Kutta methods
//!
//! Diagonally implicit tableaus (lower-triangular `A`) are solved stage by
//! stage; the collocation families below couple all stages and are solved
//! as one joint system.

use super::{Tableau, TableauError};

/// Backward Euler, 1st order, L-stable
pub fn implicit_euler() -> Result<Tableau, TableauError> {
    Tableau::from_rows("ImplicitEuler", &[&[1.0]], &[1.0], None, &[1.0], 1, None)
}

/// Implicit midpoint rule (1-stage Gauss-Legendre), 2nd order, symplectic
pub fn gauss_legendre2() -> Result<Tableau, TableauError> {
    Tableau::from_rows(
        "GaussLegendre2",
        &[&[1.0 / 2.0]],
        &[1.0],
        None,
        &[1.0 / 2.0],
        2,
        None,
    )
}

/// 2-stage Gauss-Legendre collocation, 4th order
pub fn gauss_legendre4() -> Result<Tableau, TableauError> {
    let t = 3.0_f64.sqrt() / 6.0;
    #[rustfmt::skip]
    let a: [&[f64]; 2] = [
        &[1.0/4.0,     1.0/4.0 - t],
        &[1.0/4.0 + t, 1.0/4.0],
    ];
    Tableau::from_rows(
        "GaussLegendre4",
        &a,
        &[1.0 / 2.0, 1.0 / 2.0],
        None,
        &[1.0 / 2.0 - t, 1.0 / 2.0 + t],
        4,
        None,
    )
}

/// 3-stage Gauss-Legendre collocation, 6th order
pub fn gauss_legendre6() -> Result<Tableau, TableauError> {
    let s15 = 15.0_f64.sqrt();
    let (t1, t2, t3, t4) = (s15 / 10.0, s15 / 15.0, s15 / 24.0, s15 / 30.0);
    let (w, z) = (5.0 / 36.0, 2.0 / 9.0);
    #[rustfmt::skip]
    let a: [&[f64]; 3] = [
        &[w,      z - t2, w - t4],
        &[w + t3, z,      w - t3],
        &[w + t4, z + t2, w],
    ];
    Tableau::from_rows(
        "GaussLegendre6",
        &a,
        &[5.0 / 18.0, 4.0 / 9.0, 5.0 / 18.0],
        None,
        &[1.0 / 2.0 - t1, 1.0 / 2.0, 1.0 / 2.0 + t1],
        6,
        None,
    )
}

/// 2-stage Radau IIA, 3rd order, L-stable and stiffly accurate
pub fn radau_iia3() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 2] = [
        &[5.0/12.0, -1.0/12.0],
        &[3.0/4.0,  1.0/4.0],
    ];
    Tableau::from_rows(
        "RadauIIA3",
        &a,
        &[3.0 / 4.0, 1.0 / 4.0],
        None,
        &[1.0 / 3.0, 1.0],
        3,
        None,
    )
}

/// 3-stage Radau IIA, 5th order (the method behind `RADAU5`)
///
/// # References
/// - Hairer, E., & Wanner, G. (1996). "Solving Ordinary Differential
///   Equations II: Stiff and Differential-Algebraic Problems". Springer.
pub fn radau_iia5() -> Result<Tableau, TableauError> {
    let s6 = 6.0_f64.sqrt();
    #[rustfmt::skip]
    let a: [&[f64]; 3] = [
        &[11.0/45.0 - 7.0*s6/360.0,    37.0/225.0 - 169.0*s6/1800.0, -2.0/225.0 + s6/75.0],
        &[37.0/225.0 + 169.0*s6/1800.0, 11.0/45.0 + 7.0*s6/360.0,    -2.0/225.0 - s6/75.0],
        &[4.0/9.0 - s6/36.0,            4.0/9.0 + s6/36.0,            1.0/9.0],
    ];
    Tableau::from_rows(
        "RadauIIA5",
        &a,
        &[4.0 / 9.0 - s6 / 36.0, 4.0 / 9.0 + s6 / 36.0, 1.0 / 9.0],
        None,
        &[2.0 / 5.0 - s6 / 10.0, 2.0 / 5.0 + s6 / 10.0, 1.0],
        5,
        None,
    )
}

/// 2-stage Lobatto IIIA (implicit trapezoidal rule), 2nd order
pub fn lobatto_iiia2() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 2] = [
        &[0.0,     0.0],
        &[1.0/2.0, 1.0/2.0],
    ];
    Tableau::from_rows(
        "LobattoIIIA2",
        &a,
        &[1.0 / 2.0, 1.0 / 2.0],
        None,
        &[0.0, 1.0],
        2,
        None,
    )
}

/// Strong stability preserving 3-stage, 3rd order SDIRK
pub fn sspirk33() -> Result<Tableau, TableauError> {
    let t1 = 1.0 / 2.0;
    let t2 = 2.0_f64.sqrt() / 4.0;
    let t3 = 1.0 / 3.0;
    let t4 = t1 - t2;
    let t5 = t1 + t2;
    #[rustfmt::skip]
    let a: [&[f64]; 3] = [
        &[t4],
        &[t2, t4],
        &[t2, t2, t4],
    ];
    Tableau::from_rows("SSPIRK33", &a, &[t3, t3, t3], None, &[t4, t1, t5], 3, None)
}
