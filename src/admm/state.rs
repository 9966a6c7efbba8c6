//! The ADMM iterate: primal `z`, post-prox `z12`, dual `zt`, pre-projection
//! dual `zt12`, and the previous projected iterate `z_prev`, each a
//! concatenation `(y, x) in R^(m+n)`.

use faer::{Col, ColRef};

use crate::linalg::projector::GraphProjector;
use crate::linalg::vector_ops::{cwise_multiply, cwise_quotient};
use crate::solver::Output;

/// The `y`-block (first `m` rows) of a `(y, x)` concatenated vector.
pub fn y(v: ColRef<f64>, m: usize) -> ColRef<f64> {
    v.subrows(0, m)
}

/// The `x`-block (last `n` rows) of a `(y, x)` concatenated vector.
pub fn x(v: ColRef<f64>, m: usize, n: usize) -> ColRef<f64> {
    v.subrows(m, n)
}

/// Owns the five `(y, x)` iterates an ADMM solve mutates every iteration
/// and that survive across `solve` calls so a solver handle can resume.
#[derive(Debug, Clone)]
pub struct AdmmState {
    m: usize,
    n: usize,
    pub z: Col<f64>,
    pub z12: Col<f64>,
    pub zt: Col<f64>,
    pub zt12: Col<f64>,
    pub z_prev: Col<f64>,
}

impl AdmmState {
    pub fn zeros(m: usize, n: usize) -> Self {
        let total = m + n;
        Self {
            m,
            n,
            z: Col::zeros(total),
            z12: Col::zeros(total),
            zt: Col::zeros(total),
            zt12: Col::zeros(total),
            z_prev: Col::zeros(total),
        }
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn y(v: ColRef<f64>, m: usize) -> ColRef<f64> {
        y(v, m)
    }

    pub fn x(v: ColRef<f64>, m: usize, n: usize) -> ColRef<f64> {
        x(v, m, n)
    }

    /// Initializes the scaled interior state from a user-supplied warm
    /// start `(x0, nu0)` in original (unscaled) coordinates, per spec.md
    /// §4.8. `nu0` defaults to the zero vector when not supplied.
    ///
    /// Dimensional resolution of spec.md's warm-start formula (an Open
    /// Question: the prose's `x~`/`y~` labels don't match their stated
    /// operand dimensions): `nu0` has length `m`, matching `d` and the
    /// `y`-block, so it seeds `zt`'s `y`-block; the `x`-block of `zt`
    /// follows via `x~ = -A'^T y~`, the same relation the dual-feasibility
    /// residual (spec.md §4.5) and unscaling formulas assume.
    pub fn warm_start(
        &mut self,
        projector: &GraphProjector,
        d: ColRef<f64>,
        e: ColRef<f64>,
        rho: f64,
        x0: Option<&[f64]>,
        nu0: Option<&[f64]>,
    ) {
        let (m, n) = (self.m, self.n);

        let x_scaled: Col<f64> = match x0 {
            Some(x0) => Col::from_fn(n, |i| x0[i] / e[i]),
            None => Col::zeros(n),
        };

        // y = A' * x_scaled directly, per spec.md §4.8 (`y <- A'*(x0/E)`).
        let y_scaled = projector.matrix() * x_scaled.as_ref();

        let yt_scaled: Col<f64> = match nu0 {
            Some(nu0) => Col::from_fn(m, |i| nu0[i] / (rho * d[i])),
            None => Col::zeros(m),
        };
        let atyt = projector.apply_transpose(yt_scaled.as_ref());
        let xt_scaled = Col::from_fn(n, |i| -atyt[i]);

        for i in 0..m {
            self.z[i] = y_scaled[i];
            self.zt[i] = yt_scaled[i];
        }
        for i in 0..n {
            self.z[m + i] = x_scaled[i];
            self.zt[m + i] = xt_scaled[i];
        }

        self.z12 = self.z.clone();
        self.zt12 = self.zt.clone();
        self.z_prev = self.z.clone();
    }

    /// Unscales the current half-iterates into user (original) coordinates,
    /// per spec.md §4.8: `x_out = E*x12`, `y_out = y12/D`, `mu_out =
    /// -rho*x~12/E`, `nu_out = -rho*y~12*D`.
    pub fn unscale(&self, d: ColRef<f64>, e: ColRef<f64>, rho: f64) -> Output {
        let (m, n) = (self.m, self.n);
        let y12 = y(self.z12.as_ref(), m);
        let x12 = x(self.z12.as_ref(), m, n);
        let yt12 = y(self.zt12.as_ref(), m);
        let xt12 = x(self.zt12.as_ref(), m, n);

        let x_out = cwise_multiply(e, x12);
        let y_out = cwise_quotient(y12, d);
        let mu_out = {
            let xt12_over_e = cwise_quotient(xt12, e);
            Col::from_fn(n, |i| -rho * xt12_over_e[i])
        };
        let nu_out = {
            let yt12_times_d = cwise_multiply(yt12, d);
            Col::from_fn(m, |i| -rho * yt12_times_d[i])
        };

        Output { x: x_out, y: y_out, mu: mu_out, nu: nu_out }
    }
}
