//! Projection onto the invariant manifold

use log::warn;
use nalgebra::{DMatrix, DVector};

use super::base::IntegrationError;
use super::runge_kutta::RungeKutta;
use crate::optim::DenseLu;

/// Outcome of a projection
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Projected state, or the input state when the projection failed
    pub x: DVector<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// Norm of the selected invariants at the returned state
    pub residual: f64,
}

impl RungeKutta {
    /// Project `x` onto `H(x, t) = 0`, moving as little as possible
    ///
    /// Returns `x` unchanged with `converged == true` when the system has no
    /// invariants.
    pub fn project(&self, x: &DVector<f64>, t: f64) -> Projection {
        let n = self.system.equations();
        let equations: Vec<usize> = (0..n).collect();
        let invariants: Vec<usize> = (0..self.system.num_invariants()).collect();
        self.project_subset(x, t, &equations, &invariants)
    }

    /// Project initial conditions using only some states and invariants
    ///
    /// States outside `equations` are held fixed; invariants outside
    /// `invariants` are ignored.
    pub fn project_ics(
        &self,
        x: &DVector<f64>,
        t: f64,
        equations: &[usize],
        invariants: &[usize],
    ) -> Result<Projection, IntegrationError> {
        self.check_state(x)?;
        let n = self.system.equations();
        let m = self.system.num_invariants();
        for &index in equations {
            if index >= n {
                return Err(IntegrationError::IndexOutOfRange { index, len: n });
            }
        }
        for &index in invariants {
            if index >= m {
                return Err(IntegrationError::IndexOutOfRange { index, len: m });
            }
        }

        let projection = self.project_subset(x, t, equations, invariants);
        if !projection.converged {
            warn!(
                "project_ics: no convergence after {} iterations (|H| = {:.3e})",
                projection.iterations, projection.residual
            );
        }
        Ok(projection)
    }

    /// Iterate the KKT system
    ///
    /// ```text
    /// [ I  J^T ] [ dx     ]   [ x - x_k ]
    /// [ J  0   ] [ lambda ] = [ -H(x_k) ]
    /// ```
    ///
    /// restricted to the selected states (columns) and invariants (rows).
    fn project_subset(&self, x: &DVector<f64>, t: f64, equations: &[usize], invariants: &[usize]) -> Projection {
        let tol = self.settings.projection_tolerance;
        let p = equations.len();
        let q = invariants.len();

        let select = |x_k: &DVector<f64>| {
            let h = self.system.invariants(x_k, t);
            DVector::from_iterator(q, invariants.iter().map(|&i| h[i]))
        };

        let mut x_k = x.clone();
        let mut h = select(&x_k);
        let mut residual = h.norm();
        if q == 0 || residual < tol {
            return Projection {
                x: x_k,
                converged: true,
                iterations: 0,
                residual,
            };
        }

        let failed = |iterations: usize, residual: f64| Projection {
            x: x.clone(),
            converged: false,
            iterations,
            residual,
        };

        for iteration in 1..=self.settings.max_projection_iterations {
            let jacobian = self.system.invariants_jacobian(&x_k, t);

            let mut kkt = DMatrix::zeros(p + q, p + q);
            kkt.view_mut((0, 0), (p, p)).fill_with_identity();
            for (r, &i) in invariants.iter().enumerate() {
                for (c, &j) in equations.iter().enumerate() {
                    kkt[(p + r, c)] = jacobian[(i, j)];
                    kkt[(c, p + r)] = jacobian[(i, j)];
                }
            }

            let mut rhs = DVector::zeros(p + q);
            for (c, &j) in equations.iter().enumerate() {
                rhs[c] = x[j] - x_k[j];
            }
            rhs.rows_mut(p, q).copy_from(&-&h);

            let Some(step) = DenseLu::new(kkt).and_then(|lu| lu.solve(&rhs)) else {
                return failed(iteration, residual);
            };
            let dx = step.rows(0, p);
            for (c, &j) in equations.iter().enumerate() {
                x_k[j] += dx[c];
            }

            h = select(&x_k);
            residual = h.norm();
            if !residual.is_finite() {
                return failed(iteration, residual);
            }
            if residual < tol {
                return Projection {
                    x: x_k,
                    converged: true,
                    iterations: iteration,
                    residual,
                };
            }
            if dx.norm() < tol * tol {
                return failed(iteration, residual);
            }
        }

        failed(self.settings.max_projection_iterations, residual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{ExplicitWrapper, System};
    use crate::tableau::Method;
    use approx::assert_relative_eq;

    fn circle() -> RungeKutta {
        // Rotation on the unit circle, H = x^2 + y^2 - 1
        let system = ExplicitWrapper::new("circle", 2, |x, _t| DVector::from_vec(vec![-x[1], x[0]]))
            .with_invariants(1, |x, _t| DVector::from_element(1, x[0] * x[0] + x[1] * x[1] - 1.0))
            .with_invariants_jacobian(|x, _t| DMatrix::from_row_slice(1, 2, &[2.0 * x[0], 2.0 * x[1]]));
        RungeKutta::from_method(Method::RK4, System::explicit(system)).unwrap()
    }

    #[test]
    fn test_project_onto_circle() {
        let rk = circle();
        let projection = rk.project(&DVector::from_vec(vec![1.2, 0.0]), 0.0);

        assert!(projection.converged);
        assert_relative_eq!(projection.x[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(projection.x[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_idempotent() {
        let rk = circle();
        let once = rk.project(&DVector::from_vec(vec![0.9, 0.6]), 0.0);
        let twice = rk.project(&once.x, 0.0);

        assert!(once.converged && twice.converged);
        assert_eq!(twice.iterations, 0);
        assert_relative_eq!(once.x, twice.x, epsilon = 1e-12);
    }

    #[test]
    fn test_project_ics_keeps_fixed_states() {
        let rk = circle();
        let projection = rk
            .project_ics(&DVector::from_vec(vec![0.6, 0.9]), 0.0, &[1], &[0])
            .unwrap();

        assert!(projection.converged);
        assert_eq!(projection.x[0], 0.6);
        assert_relative_eq!(projection.x[1], 0.8, epsilon = 1e-9);
    }

    #[test]
    fn test_project_ics_index_checks() {
        let rk = circle();
        let x = DVector::from_vec(vec![1.0, 0.0]);
        assert_eq!(
            rk.project_ics(&x, 0.0, &[2], &[0]),
            Err(IntegrationError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            rk.project_ics(&x, 0.0, &[0], &[1]),
            Err(IntegrationError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_projection_failure_returns_input() {
        let mut rk = circle();
        rk.set_max_projection_iterations(1);
        let x = DVector::from_vec(vec![3.0, 0.0]);
        let projection = rk.project(&x, 0.0);

        assert!(!projection.converged);
        assert_eq!(projection.x, x);
    }
}
