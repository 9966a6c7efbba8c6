//! Crate-wide error taxonomy.
//!
//! Mirrors the status codes a POGS implementation must report: malformed
//! inputs, numerical breakdown of a routine that should never fail for a
//! well-posed convex problem, allocation failure, and compiled-out features.
//! `NotConverged` is deliberately absent — per the error design, exhausting
//! `maxiter` without meeting tolerance is not an error, it is reported
//! through [`crate::solver::Info::converged`].

use thiserror::Error;

/// Errors produced by any fallible routine in this crate.
#[derive(Debug, Error)]
pub enum PogsError {
    /// Nonconforming shapes, an invalid function parameter (`c < 0` or
    /// `e < 0`), non-finite data, or a conflicting settings combination.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A routine that is convex by construction broke down numerically
    /// (Cholesky factorization not SPD, prox Newton solve diverged).
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// Allocation of a buffer failed.
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    /// The requested function primitive or solver feature is not available.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type PogsResult<T> = Result<T, PogsError>;
