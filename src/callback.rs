//! Per-iteration reporting hook (spec.md §6's `verbose`/`suppress` settings).

use crate::solver::{Residuals, Tolerances};

/// Invoked once per ADMM iteration with the current residuals/tolerances.
pub trait Callback {
    fn call(&mut self, iteration: usize, residuals: &Residuals, tolerances: &Tolerances, rho: f64);
}

/// Does nothing; used when `settings.suppress` is set or `verbose == 0`.
#[derive(Debug, Default)]
pub struct NoOpCallback;

impl Callback for NoOpCallback {
    fn call(&mut self, _iteration: usize, _residuals: &Residuals, _tolerances: &Tolerances, _rho: f64) {}
}

/// Reports primal/dual residuals and tolerances through the `log` facade
/// rather than printing directly, so a hosting application controls where
/// the output goes.
#[derive(Debug, Default)]
pub struct ConvergenceLogger;

impl ConvergenceLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Callback for ConvergenceLogger {
    fn call(&mut self, iteration: usize, residuals: &Residuals, tolerances: &Tolerances, rho: f64) {
        log::debug!(
            "iter {iteration:5}: primal {:.3e}/{:.3e}  dual {:.3e}/{:.3e}  rho {rho:.3e}",
            residuals.primal,
            tolerances.primal,
            residuals.dual,
            tolerances.dual,
        );
    }
}
