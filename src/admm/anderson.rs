//! Anderson acceleration of the ADMM fixed-point map (spec.md §4.7),
//! disabled unless `Settings::accelerate` is set.
//!
//! Mixing weights are solved from the normal equations of the residual
//! difference history, reusing [`crate::linalg::projector::solve_spd`]
//! rather than standing up a second dense-Cholesky code path. A step is
//! rejected (falling back to the plain ADMM iterate) whenever the
//! predicted residual norm exceeds `eta` times the plain step's.

use std::collections::VecDeque;

use faer::{Col, Mat};

use crate::linalg::projector::solve_spd;

/// Default sliding-window size (`Settings::accel_memory`, not one of
/// spec.md §6's default-settings since it's only consulted when
/// `accelerate` is enabled).
pub const DEFAULT_WINDOW: usize = 5;

/// Safeguard constant: reject the accelerated step if its predicted
/// residual norm exceeds `eta` times the plain ADMM step's.
pub const DEFAULT_ETA: f64 = 2.0;

pub struct AndersonAccelerator {
    window: usize,
    eta: f64,
    history: VecDeque<Col<f64>>,
}

impl AndersonAccelerator {
    pub fn new(window: usize, eta: f64) -> Self {
        Self { window: window.max(1), eta, history: VecDeque::new() }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Feeds this iteration's plain ADMM output `z_plain` into the
    /// residual history and returns either a mixed combination of recent
    /// iterates, or `z_plain` unchanged if there isn't enough history yet
    /// or the safeguard rejects the mix.
    pub fn accelerate(&mut self, z_plain: &Col<f64>) -> Col<f64> {
        self.history.push_back(z_plain.clone());
        while self.history.len() > self.window + 2 {
            self.history.pop_front();
        }
        let k = self.history.len();
        if k < 3 {
            return z_plain.clone();
        }

        let dim = z_plain.nrows();
        let r: Vec<Col<f64>> =
            (1..k).map(|i| Col::from_fn(dim, |j| self.history[i][j] - self.history[i - 1][j])).collect();
        let r_last = r.last().expect("k >= 3 implies at least 2 residuals");
        let diffs: Vec<Col<f64>> =
            (1..r.len()).map(|i| Col::from_fn(dim, |j| r[i][j] - r[i - 1][j])).collect();

        if diffs.is_empty() {
            return z_plain.clone();
        }

        let w = diffs.len();
        let gram = Mat::from_fn(w, w, |p, q| dot(&diffs[p], &diffs[q]));
        let rhs = Mat::from_fn(w, 1, |p, _| dot(&diffs[p], r_last));

        let gamma = match solve_spd(gram.as_ref(), rhs.as_ref()) {
            Ok(g) => g,
            Err(_) => return z_plain.clone(),
        };

        let mut alpha = vec![0.0; w + 1];
        alpha[0] = gamma[(0, 0)];
        for i in 1..w {
            alpha[i] = gamma[(i, 0)] - gamma[(i - 1, 0)];
        }
        alpha[w] = 1.0 - gamma[(w - 1, 0)];

        let start = k - 1 - w;
        let mixed = Col::from_fn(dim, |j| (0..=w).map(|i| alpha[i] * self.history[start + i][j]).sum::<f64>());

        let mut leftover = r_last.clone();
        for p in 0..w {
            for j in 0..dim {
                leftover[j] -= gamma[(p, 0)] * diffs[p][j];
            }
        }
        let predicted_norm = leftover.norm_l2();
        let plain_norm = r_last.norm_l2();

        if predicted_norm > self.eta * plain_norm {
            log::warn!(
                "anderson acceleration: safeguard rejected step (predicted={predicted_norm:.3e} > eta*plain={:.3e})",
                self.eta * plain_norm
            );
            return z_plain.clone();
        }

        mixed
    }
}

fn dot(a: &Col<f64>, b: &Col<f64>) -> f64 {
    (0..a.nrows()).map(|i| a[i] * b[i]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_plain_before_window_fills() {
        let mut acc = AndersonAccelerator::new(DEFAULT_WINDOW, DEFAULT_ETA);
        let z = Col::from_fn(3, |i| i as f64);
        let mixed = acc.accelerate(&z);
        for i in 0..3 {
            assert_eq!(mixed[i], z[i]);
        }
    }

    #[test]
    fn converging_sequence_produces_finite_mix() {
        let mut acc = AndersonAccelerator::new(3, 2.0);
        // A simple contracting sequence z_{k+1} = 0.5*z_k + 1.
        let mut z = Col::from_fn(2, |_| 10.0);
        for _ in 0..6 {
            let next = Col::from_fn(2, |i| 0.5 * z[i] + 1.0);
            let mixed = acc.accelerate(&next);
            assert!(mixed.iter().all(|v| v.is_finite()));
            z = next;
        }
    }
}
