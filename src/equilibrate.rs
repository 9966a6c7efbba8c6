//! Matrix equilibration: rescales `A` by positive diagonals `D`, `E` so that
//! `A' = diag(D) * A * diag(E)` has row and column norms within a bounded
//! ratio of one another, then normalizes `A'` to unit spectral norm.
//!
//! Variant: Sinkhorn-Knopp on the squared (`p=2`) row/column norms, bounded
//! to [`SINKHORN_MAX_ITERS`] row-then-column sweeps with early exit once the
//! max/min norm ratio drops under [`EQUIL_TOL`] on both rows and columns.
//! These constants are an implementation contract (spec.md leaves the exact
//! variant unstated), not a tunable `Settings` field.

use faer::{Col, Mat, MatRef};

use crate::error::{PogsError, PogsResult};

/// Row-then-column sweeps before equilibration gives up and uses whatever
/// balance it has reached.
pub const SINKHORN_MAX_ITERS: usize = 10;

/// Target max/min row (or column) norm ratio for early termination.
pub const EQUIL_TOL: f64 = 1.5;

/// Number of power-iteration steps used to estimate the spectral norm of
/// the equilibrated matrix for the final unit-norm rescale.
const SPECTRAL_NORM_ITERS: usize = 25;

/// Which equilibration strategy `Pogs::init` applies to the input matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EquilibrationKind {
    /// Sinkhorn-Knopp row/column norm balancing (the default).
    #[default]
    Sinkhorn,
    /// Skip balancing; only the final unit-spectral-norm rescale applies.
    None,
}

/// The scales produced by equilibration, and the spectral norm of `A'`
/// before the final unit-norm rescale (`normA` in the projector state).
pub struct Equilibration {
    pub d: Col<f64>,
    pub e: Col<f64>,
    pub norm_a: f64,
}

/// Equilibrates `a` in place: on return `a` holds `A'` and the returned
/// scales satisfy `A' = diag(d) * A_original * diag(e)` up to round-off,
/// with `‖A'‖ = 1` (spectral norm).
pub fn equilibrate(a: &mut Mat<f64>, kind: EquilibrationKind) -> PogsResult<Equilibration> {
    let (m, n) = (a.nrows(), a.ncols());
    if m == 0 || n == 0 {
        return Err(PogsError::InvalidArgument(
            "matrix A must have both dimensions nonzero".into(),
        ));
    }
    for i in 0..m {
        for j in 0..n {
            if !a[(i, j)].is_finite() {
                return Err(PogsError::InvalidArgument(
                    "matrix A contains a non-finite entry".into(),
                ));
            }
        }
    }

    let mut d = Col::<f64>::from_fn(m, |_| 1.0);
    let mut e = Col::<f64>::from_fn(n, |_| 1.0);

    if kind == EquilibrationKind::Sinkhorn {
        sinkhorn_knopp(a, &mut d, &mut e);
    }

    let norm_a = spectral_norm(a.as_ref(), SPECTRAL_NORM_ITERS).max(f64::MIN_POSITIVE);
    let inv_sqrt = 1.0 / norm_a.sqrt();
    let inv_qroot = inv_sqrt.sqrt();

    for j in 0..n {
        for i in 0..m {
            a[(i, j)] *= inv_sqrt;
        }
    }
    for i in 0..m {
        d[i] *= inv_qroot;
    }
    for j in 0..n {
        e[j] *= inv_qroot;
    }

    debug_assert!(d.iter().all(|&v| v > 0.0 && v.is_finite()));
    debug_assert!(e.iter().all(|&v| v > 0.0 && v.is_finite()));

    Ok(Equilibration { d, e, norm_a })
}

fn row_norms(a: &Mat<f64>) -> Vec<f64> {
    (0..a.nrows())
        .map(|i| {
            (0..a.ncols())
                .map(|j| a[(i, j)] * a[(i, j)])
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}

fn col_norms(a: &Mat<f64>) -> Vec<f64> {
    (0..a.ncols())
        .map(|j| {
            (0..a.nrows())
                .map(|i| a[(i, j)] * a[(i, j)])
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}

fn norm_ratio(norms: &[f64]) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi: f64 = 0.0;
    for &v in norms {
        if v > 0.0 {
            lo = lo.min(v);
        }
        hi = hi.max(v);
    }
    if !lo.is_finite() || hi == 0.0 { 1.0 } else { hi / lo }
}

/// Alternately rescales rows then columns of `a` toward a common norm,
/// accumulating the applied scales into `d`, `e`. A row/column that is
/// identically zero is left unscaled (clamped to scale `1.0`) rather than
/// producing a division by zero.
fn sinkhorn_knopp(a: &mut Mat<f64>, d: &mut Col<f64>, e: &mut Col<f64>) {
    let (m, n) = (a.nrows(), a.ncols());

    for _ in 0..SINKHORN_MAX_ITERS {
        let rnorms = row_norms(a);
        let mean_row = rnorms.iter().sum::<f64>() / m as f64;
        for i in 0..m {
            let scale = if rnorms[i] > 0.0 { mean_row / rnorms[i] } else { 1.0 };
            d[i] *= scale;
            for j in 0..n {
                a[(i, j)] *= scale;
            }
        }

        let cnorms = col_norms(a);
        let mean_col = cnorms.iter().sum::<f64>() / n as f64;
        for j in 0..n {
            let scale = if cnorms[j] > 0.0 { mean_col / cnorms[j] } else { 1.0 };
            e[j] *= scale;
            for i in 0..m {
                a[(i, j)] *= scale;
            }
        }

        let rnorms = row_norms(a);
        let cnorms = col_norms(a);
        if norm_ratio(&rnorms) <= EQUIL_TOL && norm_ratio(&cnorms) <= EQUIL_TOL {
            break;
        }
    }
}

/// Power-iteration estimate of `‖a‖` (the largest singular value), via the
/// dominant eigenvector of `A^T A`.
fn spectral_norm(a: MatRef<f64>, iters: usize) -> f64 {
    let n = a.ncols();
    if n == 0 {
        return 0.0;
    }
    let mut v = Col::<f64>::from_fn(n, |i| 1.0 / (i as f64 + 1.0));
    let mut v_norm = v.norm_l2();
    if v_norm == 0.0 {
        return 0.0;
    }
    v = &v * (1.0 / v_norm);

    let mut sigma = 0.0;
    for _ in 0..iters {
        let av = a * &v;
        let atav = a.transpose() * &av;
        let norm = atav.norm_l2();
        if norm <= 0.0 {
            return sigma;
        }
        v = &atav * (1.0 / norm);
        sigma = norm.sqrt();
        v_norm = v.norm_l2();
        if v_norm > 0.0 {
            v = &v * (1.0 / v_norm);
        }
    }
    sigma
}
