use nalgebra::{DMatrix, DVector};
use rksim::prelude::*;

/// Planar pendulum of unit length in Cartesian coordinates
///
/// States `(x, y, u, v)`, invariant `x^2 + y^2 - 1 = 0`.
fn pendulum() -> ExplicitWrapper {
    let g = 9.81;
    ExplicitWrapper::new("pendulum", 4, move |s, _t| {
        let (x, y, u, v) = (s[0], s[1], s[2], s[3]);
        // Tension keeping the bob on the circle
        let lambda = (u * u + v * v - g * y) / (x * x + y * y);
        DVector::from_vec(vec![u, v, -lambda * x, -lambda * y - g])
    })
    .with_invariants(1, |s, _t| DVector::from_element(1, s[0] * s[0] + s[1] * s[1] - 1.0))
    .with_invariants_jacobian(|s, _t| DMatrix::from_row_slice(1, 4, &[2.0 * s[0], 2.0 * s[1], 0.0, 0.0]))
}

fn run(method: Method, projection: bool) -> Result<(), IntegrationError> {
    let mut rk = RungeKutta::from_method(method, System::explicit(pendulum()))?;
    rk.set_absolute_tolerance(1e-8)?;
    rk.set_relative_tolerance(1e-6)?;
    if projection {
        rk.enable_projection();
    } else {
        rk.disable_projection();
    }

    let x0 = DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]);
    let solution = rk.solve(&x0, 0.0, 10.0, 1e-2)?;

    let drift = solution
        .invariants()
        .iter()
        .map(|h| h.amax())
        .fold(0.0, f64::max);
    let stats = solution.stats();

    println!(
        "  {:<18} projection {:<5}  steps {:>5} (rejected {:>3})  max |H| = {:.3e}",
        method.as_str(),
        projection,
        stats.accepted_steps,
        stats.rejected_steps,
        drift
    );
    Ok(())
}

fn main() {
    env_logger::init();

    println!("RkSim - Runge-Kutta integration of ODE/DAE systems");
    println!("==================================================\n");

    println!("Pendulum on the unit circle, t in [0, 10], atol 1e-8, rtol 1e-6\n");

    for method in [Method::BogackiShampine32, Method::DormandPrince54, Method::ESDIRK32] {
        for projection in [false, true] {
            if let Err(err) = run(method, projection) {
                println!("  {:<18} failed: {}", method.as_str(), err);
            }
        }
    }

    println!();
    println!("Available methods:");
    for method in Method::ALL {
        match method.tableau() {
            Ok(tableau) => println!(
                "  {:<18} {:<20} stages {}  order {}",
                method.as_str(),
                tableau.rk_type().as_str(),
                tableau.stages(),
                tableau.order()
            ),
            Err(err) => println!("  {:<18} invalid: {}", method.as_str(), err),
        }
    }
    println!();
    println!("Set RUST_LOG=debug and enable verbose mode to trace step control.");
}
