//! Explicit Runge-Kutta methods
//!
//! All tableaus here have a strictly lower-triangular `A`, so every stage
//! is available in closed form from the previous ones.

use super::{Tableau, TableauError};

/// Forward Euler, 1st order
pub fn explicit_euler() -> Result<Tableau, TableauError> {
    Tableau::from_rows("ExplicitEuler", &[&[]], &[1.0], None, &[0.0], 1, None)
}

/// Heun's method (explicit trapezoidal rule), 2nd order
pub fn heun2() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 2] = [
        &[],
        &[1.0],
    ];
    Tableau::from_rows("Heun2", &a, &[1.0 / 2.0, 1.0 / 2.0], None, &[0.0, 1.0], 2, None)
}

/// Ralston's 2nd order method, minimizing the truncation error bound
pub fn ralston2() -> Result<Tableau, TableauError> {
    two_stage("Ralston2", 2.0 / 3.0)
}

/// Minimal truncation error two-stage method
///
/// Shares its coefficients with [`ralston2`]; kept as its own entry because
/// both names are in common use.
pub fn mte22() -> Result<Tableau, TableauError> {
    two_stage("MTE22", 2.0 / 3.0)
}

/// Strong stability preserving 2-stage, 2nd order (Shu-Osher)
pub fn ssprk22() -> Result<Tableau, TableauError> {
    two_stage("SSPRK22", 1.0)
}

/// Strong stability preserving 2-stage, 2nd order with the largest
/// absolute-stability region on the negative real axis
pub fn ssprk22star() -> Result<Tableau, TableauError> {
    Tableau::from_rows(
        "SSPRK22star",
        &[&[], &[0.822875655532364]],
        &[0.392374781489287, 0.607625218510713],
        None,
        &[0.0, 0.822875655532364],
        2,
        None,
    )
}

/// Strong stability preserving 4-stage, 2nd order
pub fn ssprk42() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 4] = [
        &[],
        &[1.0/3.0],
        &[1.0/3.0, 1.0/3.0],
        &[1.0/3.0, 1.0/3.0, 1.0/3.0],
    ];
    Tableau::from_rows(
        "SSPRK42",
        &a,
        &[1.0 / 4.0; 4],
        None,
        &[0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0],
        2,
        None,
    )
}

/// Generic two-stage, 2nd order family parameterized by the node `alpha`
fn two_stage(name: &str, alpha: f64) -> Result<Tableau, TableauError> {
    let b2 = 1.0 / (2.0 * alpha);
    Tableau::from_rows(
        name,
        &[&[], &[alpha]],
        &[1.0 - b2, b2],
        None,
        &[0.0, alpha],
        2,
        None,
    )
}

/// Heun's 3rd order method
pub fn heun3() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 3] = [
        &[],
        &[1.0/3.0],
        &[0.0, 2.0/3.0],
    ];
    Tableau::from_rows(
        "Heun3",
        &a,
        &[1.0 / 4.0, 0.0, 3.0 / 4.0],
        None,
        &[0.0, 1.0 / 3.0, 2.0 / 3.0],
        3,
        None,
    )
}

/// Ralston's 3rd order method
pub fn ralston3() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 3] = [
        &[],
        &[1.0/2.0],
        &[0.0, 3.0/4.0],
    ];
    Tableau::from_rows(
        "Ralston3",
        &a,
        &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
        None,
        &[0.0, 1.0 / 2.0, 3.0 / 4.0],
        3,
        None,
    )
}

/// Strong stability preserving 3-stage, 3rd order (Shu-Osher)
///
/// # References
/// - Shu, C.-W., & Osher, S. (1988). "Efficient implementation of
///   essentially non-oscillatory shock-capturing schemes". Journal of
///   Computational Physics, 77(2), 439-471.
pub fn ssprk33() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 3] = [
        &[],
        &[1.0],
        &[1.0/4.0, 1.0/4.0],
    ];
    Tableau::from_rows(
        "SSPRK33",
        &a,
        &[1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
        None,
        &[0.0, 1.0, 1.0 / 2.0],
        3,
        None,
    )
}

/// Strong stability preserving 4-stage, 3rd order
///
/// Trades one extra stage for an SSP coefficient of 2.
pub fn ssprk43() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 4] = [
        &[],
        &[1.0/2.0],
        &[1.0/2.0, 1.0/2.0],
        &[1.0/6.0, 1.0/6.0, 1.0/6.0],
    ];
    Tableau::from_rows(
        "SSPRK43",
        &a,
        &[1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 2.0],
        None,
        &[0.0, 1.0 / 2.0, 1.0, 1.0 / 2.0],
        3,
        None,
    )
}

/// Strong stability preserving 9-stage, 3rd order
pub fn ssprk93() -> Result<Tableau, TableauError> {
    let (s, f) = (1.0 / 6.0, 1.0 / 15.0);
    #[rustfmt::skip]
    let a: [&[f64]; 9] = [
        &[],
        &[s],
        &[s, s],
        &[s, s, s],
        &[s, s, s, s],
        &[s, s, s, s, s],
        &[s, f, f, f, f, f],
        &[s, f, f, f, f, f, s],
        &[s, f, f, f, f, f, s, s],
    ];
    Tableau::from_rows(
        "SSPRK93",
        &a,
        &[s, f, f, f, f, f, s, s, s],
        None,
        &[0.0, 1.0 / 6.0, 1.0 / 3.0, 1.0 / 2.0, 2.0 / 3.0, 5.0 / 6.0, 1.0 / 2.0, 2.0 / 3.0, 5.0 / 6.0],
        3,
        None,
    )
}

/// Strong stability preserving 10-stage, 4th order (Ketcheson)
///
/// # References
/// - Ketcheson, D. I. (2008). "Highly efficient strong stability-preserving
///   Runge-Kutta methods with low-storage implementations". SIAM Journal on
///   Scientific Computing, 30(4), 2113-2136.
pub fn ssprk104() -> Result<Tableau, TableauError> {
    let (s, f) = (1.0 / 6.0, 1.0 / 15.0);
    #[rustfmt::skip]
    let a: [&[f64]; 10] = [
        &[],
        &[s],
        &[s, s],
        &[s, s, s],
        &[s, s, s, s],
        &[f, f, f, f, f],
        &[f, f, f, f, f, s],
        &[f, f, f, f, f, s, s],
        &[f, f, f, f, f, s, s, s],
        &[f, f, f, f, f, s, s, s, s],
    ];
    Tableau::from_rows(
        "SSPRK104",
        &a,
        &[1.0 / 10.0; 10],
        None,
        &[0.0, 1.0 / 6.0, 1.0 / 3.0, 1.0 / 2.0, 2.0 / 3.0, 1.0 / 3.0, 1.0 / 2.0, 2.0 / 3.0, 5.0 / 6.0, 1.0],
        4,
        None,
    )
}

/// 5-stage, 1st order Runge-Kutta-Chebyshev method
///
/// Stretches the real stability interval to about `[-50, 0]` for mildly
/// stiff diffusion-type problems.
pub fn chebyshev51() -> Result<Tableau, TableauError> {
    let d = 1.0 / 25.0;
    #[rustfmt::skip]
    let a: [&[f64]; 5] = [
        &[],
        &[d],
        &[2.0*d, 2.0*d],
        &[3.0*d, 4.0*d, 2.0*d],
        &[4.0*d, 6.0*d, 4.0*d, 2.0*d],
    ];
    Tableau::from_rows(
        "Chebyshev51",
        &a,
        &[5.0 * d, 8.0 * d, 6.0 * d, 4.0 * d, 2.0 * d],
        None,
        &[0.0, d, 4.0 * d, 9.0 * d, 16.0 * d],
        1,
        None,
    )
}

/// Classical 4th order Runge-Kutta method
///
/// # Butcher Tableau
/// ```text
/// 0   |
/// 1/2 | 1/2
/// 1/2 | 0    1/2
/// 1   | 0    0    1
/// ----|--------------------
///     | 1/6  1/3  1/3  1/6
/// ```
pub fn rk4() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 4] = [
        &[],
        &[1.0/2.0],
        &[0.0, 1.0/2.0],
        &[0.0, 0.0, 1.0],
    ];
    Tableau::from_rows(
        "RK4",
        &a,
        &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
        None,
        &[0.0, 1.0 / 2.0, 1.0 / 2.0, 1.0],
        4,
        None,
    )
}

/// Ralston's 4th order method, minimizing the truncation error bound
pub fn ralston4() -> Result<Tableau, TableauError> {
    let s5 = 5.0_f64.sqrt();
    #[rustfmt::skip]
    let a: [&[f64]; 4] = [
        &[],
        &[2.0/5.0],
        &[(357.0/256.0)*s5 - 2889.0/1024.0, 3785.0/1024.0 - (405.0/256.0)*s5],
        &[(1047.0/3020.0)*s5 - 673.0/1208.0, -975.0/2552.0 - (1523.0/1276.0)*s5, 93408.0/48169.0 + (203968.0/240845.0)*s5],
    ];
    #[rustfmt::skip]
    let b = [
        263.0/1812.0 + (2.0/151.0)*s5,
        125.0/3828.0 - (250.0/957.0)*s5,
        3426304.0/5924787.0 + (553984.0/1974929.0)*s5,
        10.0/41.0 - (4.0/123.0)*s5,
    ];
    Tableau::from_rows(
        "Ralston4",
        &a,
        &b,
        None,
        &[0.0, 2.0 / 5.0, 7.0 / 8.0 - (3.0 / 16.0) * s5, 1.0],
        4,
        None,
    )
}
