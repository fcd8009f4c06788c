//! Finite-difference Jacobians

use nalgebra::{DMatrix, DVector};

/// Relative perturbation for central differences (close to `eps^(1/3)`)
const FD_RELATIVE_STEP: f64 = 6e-6;

/// Compute numerical Jacobian using central differences
///
/// The perturbation of component `i` is `r * max(|x_i|, 1)`, so components
/// near zero still get a step well above round-off.
pub fn numerical_jacobian<F>(func: &F, x: &DVector<f64>) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let n = x.len();
    let m = func(x).len();
    let mut jac = DMatrix::<f64>::zeros(m, n);

    let mut x_plus = x.clone();
    let mut x_minus = x.clone();
    for i in 0..n {
        let h = FD_RELATIVE_STEP * x[i].abs().max(1.0);
        x_plus[i] = x[i] + h;
        x_minus[i] = x[i] - h;

        let f_plus = func(&x_plus);
        let f_minus = func(&x_minus);
        jac.set_column(i, &((f_plus - f_minus) / (2.0 * h)));

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    jac
}
