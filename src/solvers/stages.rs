//! Stage assembly
//!
//! Stage unknowns are stored scaled by the step, `K_i = h * k_i`, so that
//! the update reads `x_next = x_n + sum_i b_i K_i`. All evaluations happen in
//! the internal time `tau`, which is `-t` in reverse mode; the [`Evaluator`]
//! hides the sign conventions so the four paths below are direction-agnostic.

use nalgebra::{DMatrix, DVector};

use super::base::{StepFailure, StepInfo};
use crate::optim::{is_finite, StageSolver};
use crate::system::System;
use crate::tableau::{RkType, Tableau};

/// System evaluations in internal time
pub(crate) struct Evaluator<'a> {
    system: &'a System,
    reverse: bool,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(system: &'a System, reverse: bool) -> Self {
        Self { system, reverse }
    }

    fn has_explicit_form(&self) -> bool {
        self.system.has_explicit_form()
    }

    fn residual(&self, x: &DVector<f64>, x_dot: &DVector<f64>, tau: f64) -> DVector<f64> {
        if self.reverse {
            self.system.residual_reverse(x, x_dot, tau)
        } else {
            self.system.residual(x, x_dot, tau)
        }
    }

    fn jacobian_x(&self, x: &DVector<f64>, x_dot: &DVector<f64>, tau: f64) -> DMatrix<f64> {
        if self.reverse {
            self.system.jacobian_x_reverse(x, x_dot, tau)
        } else {
            self.system.jacobian_x(x, x_dot, tau)
        }
    }

    fn jacobian_x_dot(&self, x: &DVector<f64>, x_dot: &DVector<f64>, tau: f64) -> DMatrix<f64> {
        if self.reverse {
            self.system.jacobian_x_dot_reverse(x, x_dot, tau)
        } else {
            self.system.jacobian_x_dot(x, x_dot, tau)
        }
    }

    fn rhs(&self, x: &DVector<f64>, tau: f64) -> Option<DVector<f64>> {
        if self.reverse {
            self.system.rhs_reverse(x, tau)
        } else {
            self.system.rhs(x, tau)
        }
    }
}

/// Compute the scaled stages `K_i` of one step from `(x_n, tau)` with step `h > 0`
pub(crate) fn compute(
    tableau: &Tableau,
    eval: &Evaluator<'_>,
    solver: &mut StageSolver,
    x_n: &DVector<f64>,
    tau: f64,
    h: f64,
    info: &mut StepInfo,
) -> Result<Vec<DVector<f64>>, StepFailure> {
    match tableau.rk_type() {
        RkType::Explicit if eval.has_explicit_form() => {
            erk_explicit(tableau, eval, solver, x_n, tau, h, info)
        }
        RkType::Explicit | RkType::DiagonallyImplicit => {
            sequential(tableau, eval, solver, x_n, tau, h, info)
        }
        RkType::Implicit => irk(tableau, eval, solver, x_n, tau, h, info),
    }
}

/// Weighted stage combination `x_n + sum_i w_i K_i`
pub(crate) fn combine(x_n: &DVector<f64>, weights: &DVector<f64>, k: &[DVector<f64>]) -> DVector<f64> {
    let mut x = x_n.clone();
    for (w, ki) in weights.iter().zip(k) {
        if *w != 0.0 {
            x.axpy(*w, ki, 1.0);
        }
    }
    x
}

/// `x_n + sum_{j < upto} A[i, j] K_j`
fn stage_base(tableau: &Tableau, x_n: &DVector<f64>, k: &[DVector<f64>], i: usize, upto: usize) -> DVector<f64> {
    let a = tableau.a();
    let mut node = x_n.clone();
    for (j, kj) in k.iter().enumerate().take(upto) {
        if a[(i, j)] != 0.0 {
            node.axpy(a[(i, j)], kj, 1.0);
        }
    }
    node
}

/// `K = h f(node, t)` when the system has an explicit form at `node`
///
/// `Ok(None)` means no closed form exists there: an implicit system, or a
/// mass-matrix form whose mass matrix is singular.
fn closed_form(
    eval: &Evaluator<'_>,
    node: &DVector<f64>,
    t: f64,
    h: f64,
    info: &mut StepInfo,
) -> Result<Option<DVector<f64>>, StepFailure> {
    if !eval.has_explicit_form() {
        return Ok(None);
    }
    let Some(f) = eval.rhs(node, t) else {
        return Ok(None);
    };
    info.rhs_evaluations += 1;
    let k = f * h;
    if is_finite(&k) {
        Ok(Some(k))
    } else {
        Err(StepFailure::NonFinite)
    }
}

/// Solve `F(base + a_ii K, K / h, t) = 0` for one stage
#[allow(clippy::too_many_arguments)]
fn solve_stage(
    eval: &Evaluator<'_>,
    solver: &mut StageSolver,
    base: &DVector<f64>,
    a_ii: f64,
    t: f64,
    h: f64,
    guess: DVector<f64>,
    info: &mut StepInfo,
) -> Result<DVector<f64>, StepFailure> {
    let result = solver.solve(
        |ki| eval.residual(&(base + a_ii * ki), &(ki / h), t),
        |ki| {
            let node = base + a_ii * ki;
            let x_dot = ki / h;
            let jx_dot = eval.jacobian_x_dot(&node, &x_dot, t) / h;
            if a_ii == 0.0 {
                jx_dot
            } else {
                eval.jacobian_x(&node, &x_dot, t) * a_ii + jx_dot
            }
        },
        guess,
    );
    info.stage_solves += 1;
    info.nonlinear.absorb(solver.stats());

    let ki = result?;
    if !is_finite(&ki) {
        return Err(StepFailure::NonFinite);
    }
    Ok(ki)
}

/// Explicit tableau on a system with an explicit form
///
/// Every stage is evaluated in closed form without a nonlinear solve. A
/// stage whose mass matrix is singular falls back to the implicit residual.
fn erk_explicit(
    tableau: &Tableau,
    eval: &Evaluator<'_>,
    solver: &mut StageSolver,
    x_n: &DVector<f64>,
    tau: f64,
    h: f64,
    info: &mut StepInfo,
) -> Result<Vec<DVector<f64>>, StepFailure> {
    let c = tableau.c();
    let mut k = Vec::with_capacity(tableau.stages());
    for i in 0..tableau.stages() {
        let node = stage_base(tableau, x_n, &k, i, i);
        let t_i = tau + c[i] * h;
        let ki = match closed_form(eval, &node, t_i, h, info)? {
            Some(ki) => ki,
            None => {
                let guess = k.last().cloned().unwrap_or_else(|| DVector::zeros(x_n.len()));
                solve_stage(eval, solver, &node, 0.0, t_i, h, guess, info)?
            }
        };
        k.push(ki);
    }
    Ok(k)
}

/// One nonlinear solve per stage, in order
///
/// Covers explicit tableaus on implicit systems (the diagonal is zero, so
/// only `dF/dx'` enters the Jacobian) and diagonally implicit tableaus.
/// Stages with a zero diagonal are evaluated in closed form when the system
/// has one at that point. The first solved stage starts from the closed
/// form if available and from zero otherwise; later stages start from the
/// previous stage.
fn sequential(
    tableau: &Tableau,
    eval: &Evaluator<'_>,
    solver: &mut StageSolver,
    x_n: &DVector<f64>,
    tau: f64,
    h: f64,
    info: &mut StepInfo,
) -> Result<Vec<DVector<f64>>, StepFailure> {
    let a = tableau.a();
    let c = tableau.c();
    let mut k: Vec<DVector<f64>> = Vec::with_capacity(tableau.stages());

    for i in 0..tableau.stages() {
        let base = stage_base(tableau, x_n, &k, i, i);
        let a_ii = a[(i, i)];
        let t_i = tau + c[i] * h;

        let explicit = if a_ii == 0.0 || k.is_empty() {
            closed_form(eval, &base, t_i, h, info)?
        } else {
            None
        };
        if a_ii == 0.0 {
            if let Some(ki) = explicit {
                k.push(ki);
                continue;
            }
        }

        let guess = match (k.last(), explicit) {
            (Some(previous), _) => previous.clone(),
            (None, Some(ki)) => ki,
            (None, None) => DVector::zeros(x_n.len()),
        };
        k.push(solve_stage(eval, solver, &base, a_ii, t_i, h, guess, info)?);
    }
    Ok(k)
}

fn split(y: &DVector<f64>, stages: usize, n: usize) -> Vec<DVector<f64>> {
    (0..stages).map(|i| y.rows(i * n, n).into_owned()).collect()
}

/// Fully implicit tableau: one joint solve for all `S * N` stage unknowns
fn irk(
    tableau: &Tableau,
    eval: &Evaluator<'_>,
    solver: &mut StageSolver,
    x_n: &DVector<f64>,
    tau: f64,
    h: f64,
    info: &mut StepInfo,
) -> Result<Vec<DVector<f64>>, StepFailure> {
    let s = tableau.stages();
    let n = x_n.len();
    let a = tableau.a();
    let c = tableau.c();
    let all = |k: &[DVector<f64>], i: usize| stage_base(tableau, x_n, k, i, s);

    // Every stage starts from the closed form at x_n, or from zero for DAEs
    let mut guess = DVector::zeros(s * n);
    if let Some(k0) = closed_form(eval, x_n, tau, h, info)? {
        for i in 0..s {
            guess.rows_mut(i * n, n).copy_from(&k0);
        }
    }

    let result = solver.solve(
        |y| {
            let k = split(y, s, n);
            let mut g = DVector::zeros(s * n);
            for i in 0..s {
                let node = all(&k, i);
                let r = eval.residual(&node, &(&k[i] / h), tau + c[i] * h);
                g.rows_mut(i * n, n).copy_from(&r);
            }
            g
        },
        |y| {
            let k = split(y, s, n);
            let mut jac = DMatrix::zeros(s * n, s * n);
            for i in 0..s {
                let node = all(&k, i);
                let x_dot = &k[i] / h;
                let t_i = tau + c[i] * h;
                let jx = eval.jacobian_x(&node, &x_dot, t_i);
                for j in 0..s {
                    if a[(i, j)] != 0.0 {
                        let block = &jx * a[(i, j)];
                        jac.view_mut((i * n, j * n), (n, n)).copy_from(&block);
                    }
                }
                let jx_dot = eval.jacobian_x_dot(&node, &x_dot, t_i) / h;
                let mut diagonal = jac.view_mut((i * n, i * n), (n, n));
                diagonal += jx_dot;
            }
            jac
        },
        guess,
    );
    info.stage_solves += 1;
    info.nonlinear.absorb(solver.stats());

    let y = result?;
    if !is_finite(&y) {
        return Err(StepFailure::NonFinite);
    }
    Ok(split(&y, s, n))
}
