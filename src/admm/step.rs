//! The four numbered operations of one ADMM iteration (spec.md §4.4):
//! prox, project, dual update, and the `z_prev` rotation.

use faer::Col;

use super::state::{AdmmState, x, y};
use crate::error::PogsResult;
use crate::function::FunctionVector;
use crate::linalg::projector::GraphProjector;

/// Step 1: `z12 <- prox_{F,rho}(z - zt)`, `F = (f on y, g on x)`.
pub fn prox_step(state: &mut AdmmState, f: &FunctionVector, g: &FunctionVector, rho: f64) -> PogsResult<()> {
    let (m, n) = (state.m(), state.n());

    let v_y: Col<f64> = Col::from_fn(m, |i| y(state.z.as_ref(), m)[i] - y(state.zt.as_ref(), m)[i]);
    let v_x: Col<f64> = Col::from_fn(n, |i| x(state.z.as_ref(), m, n)[i] - x(state.zt.as_ref(), m, n)[i]);

    let mut y12 = Col::<f64>::zeros(m);
    let mut x12 = Col::<f64>::zeros(n);
    f.prox(rho, v_y.as_ref(), &mut y12)?;
    g.prox(rho, v_x.as_ref(), &mut x12)?;

    for i in 0..m {
        state.z12[i] = y12[i];
    }
    for i in 0..n {
        state.z12[m + i] = x12[i];
    }
    Ok(())
}

/// Step 2: `z+ <- Project(alpha*z12 + (1-alpha)*z_prev + zt)`.
pub fn project_step(state: &mut AdmmState, projector: &GraphProjector, alpha: f64) -> PogsResult<()> {
    let (m, n) = (state.m(), state.n());

    let c_y: Col<f64> = Col::from_fn(m, |i| {
        alpha * y(state.z12.as_ref(), m)[i]
            + (1.0 - alpha) * y(state.z_prev.as_ref(), m)[i]
            + y(state.zt.as_ref(), m)[i]
    });
    let c_x: Col<f64> = Col::from_fn(n, |i| {
        alpha * x(state.z12.as_ref(), m, n)[i]
            + (1.0 - alpha) * x(state.z_prev.as_ref(), m, n)[i]
            + x(state.zt.as_ref(), m, n)[i]
    });

    let mut x_out = Col::<f64>::zeros(n);
    let mut y_out = Col::<f64>::zeros(m);
    projector.project(c_x.as_ref(), c_y.as_ref(), &mut x_out, &mut y_out)?;

    for i in 0..m {
        state.z[i] = y_out[i];
    }
    for i in 0..n {
        state.z[m + i] = x_out[i];
    }
    Ok(())
}

/// Step 3: `zt12 <- z12 - z_prev + zt`; `zt <- zt + alpha*z12 +
/// (1-alpha)*z_prev - z+`. Step 4: `z_prev <- z+` (call after this).
pub fn dual_update_step(state: &mut AdmmState, alpha: f64) {
    let total = state.m() + state.n();
    for i in 0..total {
        state.zt12[i] = state.z12[i] - state.z_prev[i] + state.zt[i];
        state.zt[i] = state.zt[i] + alpha * state.z12[i] + (1.0 - alpha) * state.z_prev[i] - state.z[i];
    }
}

/// Step 4: `z_prev <- z+`.
pub fn rotate_step(state: &mut AdmmState) {
    state.z_prev = state.z.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionVector, Primitive, Term};
    use faer::Mat;

    #[test]
    fn one_iteration_preserves_graph_feasibility() {
        let a = Mat::from_fn(2, 3, |i, j| ((i + 2 * j + 1) as f64) * 0.3);
        let projector = GraphProjector::new(a.as_ref()).unwrap();
        let mut state = AdmmState::zeros(2, 3);

        let f = FunctionVector::new(vec![Term::of(Primitive::Square); 2]).unwrap();
        let g = FunctionVector::zeros(3);

        prox_step(&mut state, &f, &g, 1.0).unwrap();
        project_step(&mut state, &projector, 1.7).unwrap();
        dual_update_step(&mut state, 1.7);
        rotate_step(&mut state);

        let y_block = y(state.z.as_ref(), 2);
        let x_block = x(state.z.as_ref(), 2, 3);
        let ax = &a * &x_block;
        for i in 0..2 {
            assert!((ax[i] - y_block[i]).abs() < 1e-8);
        }
    }
}
