//! The direct graph projector: Euclidean projection onto `{(x,y) : y = Ax}`.
//!
//! Factoring the smaller of `I + A A^T` (size `m`) and `I + A^T A` (size
//! `n`) once up front lets every ADMM iteration resolve the projection with
//! a single triangular solve instead of a fresh factorization.

use faer::linalg::solvers::{DenseSolveCore, Llt};
use faer::{Col, ColRef, Mat, MatRef, Side};

use crate::error::{PogsError, PogsResult};

/// Which Gram matrix was factored, determining the Woodbury-reduced solve path.
enum Factorization {
    /// `m <= n`: factored `I + A A^T` directly (size `m`).
    Small { llt: Llt<f64> },
    /// `m > n`: factored `I + A^T A` (size `n`) and apply the
    /// Woodbury identity to avoid ever forming the `m x m` system.
    Wide { llt: Llt<f64> },
}

/// Direct projector onto the graph `{(x,y): y = Ax}` via a cached dense
/// Cholesky factorization of whichever normal-equations matrix is smaller.
pub struct GraphProjector {
    a: Mat<f64>,
    factorization: Factorization,
}

impl GraphProjector {
    /// Factors the projector for a given (equilibrated) matrix `A` (m x n).
    pub fn new(a: MatRef<f64>) -> PogsResult<Self> {
        let (m, n) = (a.nrows(), a.ncols());

        let factorization = if m <= n {
            let mut gram = Mat::<f64>::identity(m, m);
            // gram = I + A A^T
            faer::linalg::matmul::matmul(
                gram.as_mut(),
                faer::Accum::Add,
                a,
                a.transpose(),
                1.0,
                faer::Par::Seq,
            );
            let llt = Llt::new(gram.as_ref(), Side::Lower).map_err(|_| {
                PogsError::NumericalFailure(
                    "graph projector Cholesky factorization of I + A*A^T was not SPD".into(),
                )
            })?;
            Factorization::Small { llt }
        } else {
            let mut gram = Mat::<f64>::identity(n, n);
            // gram = I + A^T A
            faer::linalg::matmul::matmul(
                gram.as_mut(),
                faer::Accum::Add,
                a.transpose(),
                a,
                1.0,
                faer::Par::Seq,
            );
            let llt = Llt::new(gram.as_ref(), Side::Lower).map_err(|_| {
                PogsError::NumericalFailure(
                    "graph projector Cholesky factorization of I + A^T*A was not SPD".into(),
                )
            })?;
            Factorization::Wide { llt }
        };

        Ok(Self { a: a.to_owned(), factorization })
    }

    pub fn m(&self) -> usize {
        self.a.nrows()
    }

    pub fn n(&self) -> usize {
        self.a.ncols()
    }

    /// Borrows the stored equilibrated matrix (e.g. to evaluate `A'*v` or
    /// `A'^T*v` outside of a projection, as warm-start scaling needs).
    pub fn matrix(&self) -> MatRef<f64> {
        self.a.as_ref()
    }

    /// `A'^T * v`.
    pub fn apply_transpose(&self, v: ColRef<f64>) -> Col<f64> {
        assert_eq!(v.nrows(), self.m());
        let mut out = Mat::<f64>::zeros(self.n(), 1);
        faer::linalg::matmul::matmul(
            out.as_mut(),
            faer::Accum::Replace,
            self.a.transpose(),
            v.as_mat(),
            1.0,
            faer::Par::Seq,
        );
        Col::from_fn(self.n(), |i| out[(i, 0)])
    }

    /// Projects `(x0, y0)` onto `{(x,y): y = Ax}`, writing the result into
    /// `x` and `y`. `x`/`y` may alias `x0`/`y0`.
    pub fn project(
        &self,
        x0: ColRef<f64>,
        y0: ColRef<f64>,
        x: &mut Col<f64>,
        y: &mut Col<f64>,
    ) -> PogsResult<()> {
        let (m, n) = (self.m(), self.n());
        assert_eq!(x0.nrows(), n);
        assert_eq!(y0.nrows(), m);

        // w = A*x0 - y0
        let mut w = Mat::<f64>::zeros(m, 1);
        faer::linalg::matmul::matmul(
            w.as_mut(),
            faer::Accum::Replace,
            self.a.as_ref(),
            x0.as_mat(),
            1.0,
            faer::Par::Seq,
        );
        for i in 0..m {
            w[(i, 0)] -= y0[i];
        }

        let nu = match &self.factorization {
            Factorization::Small { llt } => {
                let mut nu = w.clone();
                llt.solve_in_place(nu.as_mut());
                nu
            }
            Factorization::Wide { llt } => {
                // z = (I + A^T A)^-1 A^T w ; nu = w - A z
                let mut atw = Mat::<f64>::zeros(n, 1);
                faer::linalg::matmul::matmul(
                    atw.as_mut(),
                    faer::Accum::Replace,
                    self.a.transpose(),
                    w.as_ref(),
                    1.0,
                    faer::Par::Seq,
                );
                llt.solve_in_place(atw.as_mut());

                let mut az = Mat::<f64>::zeros(m, 1);
                faer::linalg::matmul::matmul(
                    az.as_mut(),
                    faer::Accum::Replace,
                    self.a.as_ref(),
                    atw.as_ref(),
                    1.0,
                    faer::Par::Seq,
                );

                let mut nu = w.clone();
                for i in 0..m {
                    nu[(i, 0)] -= az[(i, 0)];
                }
                nu
            }
        };

        // x = x0 - A^T*nu, y = y0 + nu
        let mut atnu = Mat::<f64>::zeros(n, 1);
        faer::linalg::matmul::matmul(
            atnu.as_mut(),
            faer::Accum::Replace,
            self.a.transpose(),
            nu.as_ref(),
            1.0,
            faer::Par::Seq,
        );
        for i in 0..n {
            x[i] = x0[i] - atnu[(i, 0)];
        }
        for i in 0..m {
            y[i] = y0[i] + nu[(i, 0)];
        }

        Ok(())
    }
}

/// Solves a small dense SPD system `gram * x = rhs` via Cholesky, for
/// reuse by callers (Anderson acceleration's mixing-weight least squares)
/// that need the same dense factorization machinery as the projector
/// without standing up a second `GraphProjector`.
pub fn solve_spd(gram: MatRef<f64>, rhs: MatRef<f64>) -> PogsResult<Mat<f64>> {
    let llt = Llt::new(gram, Side::Lower).map_err(|_| {
        PogsError::NumericalFailure("dense SPD solve: Cholesky factorization was not SPD".into())
    })?;
    let mut x = rhs.to_owned();
    llt.solve_in_place(x.as_mut());
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(a: &[Vec<f64>]) -> Mat<f64> {
        let m = a.len();
        let n = a[0].len();
        Mat::from_fn(m, n, |i, j| a[i][j])
    }

    #[test]
    fn projection_is_feasible_and_idempotent() {
        let a = dense(&[vec![1.0, 2.0, 0.5], vec![0.0, 1.0, -1.0]]);
        let proj = GraphProjector::new(a.as_ref()).unwrap();

        let x0 = Col::from_fn(3, |i| (i as f64) - 1.0);
        let y0 = Col::from_fn(2, |i| 2.0 * i as f64 - 3.0);

        let mut x = Col::<f64>::zeros(3);
        let mut y = Col::<f64>::zeros(2);
        proj.project(x0.as_ref(), y0.as_ref(), &mut x, &mut y).unwrap();

        let mut ax = Mat::<f64>::zeros(2, 1);
        faer::linalg::matmul::matmul(
            ax.as_mut(),
            faer::Accum::Replace,
            a.as_ref(),
            x.as_mat(),
            1.0,
            faer::Par::Seq,
        );
        for i in 0..2 {
            assert!((ax[(i, 0)] - y[i]).abs() < 1e-8);
        }

        // Projecting an already-feasible point is a no-op.
        let mut x2 = Col::<f64>::zeros(3);
        let mut y2 = Col::<f64>::zeros(2);
        proj.project(x.as_ref(), y.as_ref(), &mut x2, &mut y2).unwrap();
        for i in 0..3 {
            assert!((x2[i] - x[i]).abs() < 1e-8);
        }
        for i in 0..2 {
            assert!((y2[i] - y[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn wide_and_tall_paths_agree_via_transpose() {
        // m <= n path
        let a_wide = dense(&[vec![1.0, 0.0, 2.0], vec![0.0, 1.0, 1.0]]);
        let proj_wide = GraphProjector::new(a_wide.as_ref()).unwrap();
        assert_eq!(proj_wide.m(), 2);

        // m > n path
        let a_tall = dense(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 1.0]]);
        let proj_tall = GraphProjector::new(a_tall.as_ref()).unwrap();
        assert_eq!(proj_tall.n(), 2);
    }

    #[test]
    fn solve_spd_matches_known_solution() {
        let gram = dense(&[vec![4.0, 1.0], vec![1.0, 3.0]]);
        let rhs = Mat::<f64>::from_fn(2, 1, |i, _| [1.0, 2.0][i]);
        let x = solve_spd(gram.as_ref(), rhs.as_ref()).unwrap();

        let mut check = Mat::<f64>::zeros(2, 1);
        faer::linalg::matmul::matmul(
            check.as_mut(),
            faer::Accum::Replace,
            gram.as_ref(),
            x.as_ref(),
            1.0,
            faer::Par::Seq,
        );
        for i in 0..2 {
            assert!((check[(i, 0)] - rhs[(i, 0)]).abs() < 1e-10);
        }
    }
}
