//! Embedded Runge-Kutta pairs
//!
//! Each pair shares its stages between a propagating solution (`b`) and an
//! embedded one (`b_hat`); their difference drives the step-size controller.

use super::{Tableau, TableauError};

/// Bogacki-Shampine 3(2) pair
///
/// The underlying method of MATLAB's `ode23`. The last stage is evaluated at
/// the propagated solution, so the pair is FSAL.
///
/// # Characteristics
/// - Order: 3 (propagating) / 2 (embedded)
/// - Stages: 4
///
/// # References
/// - Bogacki, P., & Shampine, L. F. (1989). "A 3(2) pair of
///   Runge-Kutta formulas". Applied Mathematics Letters, 2(4),
///   321-325.
pub fn bogacki_shampine32() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 4] = [
        &[],
        &[1.0/2.0],
        &[0.0, 3.0/4.0],
        &[2.0/9.0, 1.0/3.0, 4.0/9.0],
    ];
    Tableau::from_rows(
        "BogackiShampine32",
        &a,
        &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0],
        Some(&[7.0 / 24.0, 1.0 / 4.0, 1.0 / 3.0, 1.0 / 8.0][..]),
        &[0.0, 1.0 / 2.0, 3.0 / 4.0, 1.0],
        3,
        Some(2),
    )
}

/// Runge-Kutta-Fehlberg 4(5) pair
///
/// Propagates the 4th order solution; the 5th order one is used only for the
/// error estimate.
///
/// # References
/// - Fehlberg, E. (1969). "Low-order classical Runge-Kutta formulas with
///   stepsize control and their application to some heat transfer
///   problems". NASA Technical Report 315.
pub fn fehlberg45() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 6] = [
        &[],
        &[1.0/4.0],
        &[3.0/32.0, 9.0/32.0],
        &[1932.0/2197.0, -7200.0/2197.0, 7296.0/2197.0],
        &[439.0/216.0, -8.0, 3680.0/513.0, -845.0/4104.0],
        &[-8.0/27.0, 2.0, -3544.0/2565.0, 1859.0/4104.0, -11.0/40.0],
    ];
    #[rustfmt::skip]
    let b = [25.0/216.0, 0.0, 1408.0/2565.0, 2197.0/4104.0, -1.0/5.0, 0.0];
    #[rustfmt::skip]
    let b_hat = [16.0/135.0, 0.0, 6656.0/12825.0, 28561.0/56430.0, -9.0/50.0, 2.0/55.0];
    Tableau::from_rows(
        "Fehlberg45",
        &a,
        &b,
        Some(&b_hat[..]),
        &[0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0],
        4,
        Some(5),
    )
}

/// Dormand-Prince 5(4) pair
///
/// Seven stages with FSAL; the default explicit pair of most ODE suites
/// (MATLAB's `ode45`).
///
/// # Characteristics
/// - Order: 5 (propagating) / 4 (embedded)
/// - Stages: 7 (6 effective with FSAL)
///
/// # References
/// - Dormand, J. R., & Prince, P. J. (1980). "A family of embedded
///   Runge-Kutta formulae". Journal of Computational and Applied
///   Mathematics, 6(1), 19-26.
pub fn dormand_prince54() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 7] = [
        &[],
        &[1.0/5.0],
        &[3.0/40.0, 9.0/40.0],
        &[44.0/45.0, -56.0/15.0, 32.0/9.0],
        &[19372.0/6561.0, -25360.0/2187.0, 64448.0/6561.0, -212.0/729.0],
        &[9017.0/3168.0, -355.0/33.0, 46732.0/5247.0, 49.0/176.0, -5103.0/18656.0],
        &[35.0/384.0, 0.0, 500.0/1113.0, 125.0/192.0, -2187.0/6784.0, 11.0/84.0],
    ];
    #[rustfmt::skip]
    let b = [35.0/384.0, 0.0, 500.0/1113.0, 125.0/192.0, -2187.0/6784.0, 11.0/84.0, 0.0];
    #[rustfmt::skip]
    let b_hat = [
        5179.0/57600.0, 0.0, 7571.0/16695.0, 393.0/640.0,
        -92097.0/339200.0, 187.0/2100.0, 1.0/40.0,
    ];
    Tableau::from_rows(
        "DormandPrince54",
        &a,
        &b,
        Some(&b_hat[..]),
        &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
        5,
        Some(4),
    )
}

/// Four-stage, 3rd order L-stable ESDIRK with embedded 2nd order weights
///
/// Explicit first stage, constant diagonal `1/2`, stiffly accurate.
///
/// # Butcher Tableau
/// ```text
/// 0   | 0
/// 1   | 1/2   1/2
/// 3/2 | 5/8   3/8   1/2
/// 1   | 7/18  1/3   -2/9  1/2
/// ----|------------------------
///     | 7/18  1/3   -2/9  1/2
///     | 1/2   1/2   0     0
/// ```
pub fn esdirk32() -> Result<Tableau, TableauError> {
    #[rustfmt::skip]
    let a: [&[f64]; 4] = [
        &[],
        &[1.0/2.0, 1.0/2.0],
        &[5.0/8.0, 3.0/8.0, 1.0/2.0],
        &[7.0/18.0, 1.0/3.0, -2.0/9.0, 1.0/2.0],
    ];
    Tableau::from_rows(
        "ESDIRK32",
        &a,
        &[7.0 / 18.0, 1.0 / 3.0, -2.0 / 9.0, 1.0 / 2.0],
        Some(&[1.0 / 2.0, 1.0 / 2.0, 0.0, 0.0][..]),
        &[0.0, 1.0, 3.0 / 2.0, 1.0],
        3,
        Some(2),
    )
}
