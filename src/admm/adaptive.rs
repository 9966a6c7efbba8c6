//! Adaptive penalty (`rho`) adjustment (spec.md §4.6).
//!
//! Constants are an implementation contract spec.md leaves unspecified:
//! imbalance threshold `tau = 5.0` on the ratio of normalized primal to
//! dual progress, one iteration (`k = 1`) before acting, a one-iteration
//! cooldown between adjustments, growth `gamma = min(delta^k, gamma_max)`
//! with `delta = 1.05`, `gamma_max = 100`, and a cap of 20 total
//! adjustments per solve after which adaptation disables itself for the
//! rest of the run (logged once at `warn`).

use faer::Col;

const TAU: f64 = 5.0;
const DELTA: f64 = 1.05;
const GAMMA_MAX: f64 = 1e2;
const MAX_ADJUSTMENTS: usize = 20;
const COOLDOWN_ITERS: usize = 1;

/// Tracks adjustment history across a solve so the cap and cooldown apply.
#[derive(Debug, Clone)]
pub struct AdaptiveRho {
    enabled: bool,
    adjustments: usize,
    cooldown_remaining: usize,
    cap_logged: bool,
}

impl AdaptiveRho {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, adjustments: 0, cooldown_remaining: 0, cap_logged: false }
    }

    /// Observes this iteration's (primal, dual) residual-to-tolerance
    /// ratios and, if imbalanced beyond `tau`, rescales `rho` and `zt` in
    /// place (`rho*zt` invariant, spec.md §4.6's adaptation invariant).
    /// Returns whether an adjustment was applied.
    pub fn maybe_adjust(&mut self, rho: &mut f64, zt: &mut Col<f64>, r_p: f64, eps_p: f64, r_d: f64, eps_d: f64) -> bool {
        if !self.enabled {
            return false;
        }
        if self.adjustments >= MAX_ADJUSTMENTS {
            if !self.cap_logged {
                log::warn!(
                    "adaptive rho: reached the cap of {MAX_ADJUSTMENTS} adjustments, disabling further adaptation for this solve"
                );
                self.cap_logged = true;
            }
            return false;
        }
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return false;
        }

        let tiny = 1e-12;
        let rp_norm = r_p / eps_p.max(tiny);
        let rd_norm = r_d / eps_d.max(tiny);
        let ratio = rp_norm / rd_norm.max(tiny);

        let gamma = DELTA.min(GAMMA_MAX);

        if ratio > TAU {
            *rho *= gamma;
            for v in zt.iter_mut() {
                *v /= gamma;
            }
            self.adjustments += 1;
            self.cooldown_remaining = COOLDOWN_ITERS;
            log::debug!("adaptive rho: primal dominates (ratio={ratio:.3}), rho -> {rho:.6e}");
            true
        } else if ratio < 1.0 / TAU {
            *rho /= gamma;
            for v in zt.iter_mut() {
                *v *= gamma;
            }
            self.adjustments += 1;
            self.cooldown_remaining = COOLDOWN_ITERS;
            log::debug!("adaptive rho: dual dominates (ratio={ratio:.3}), rho -> {rho:.6e}");
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_never_adjusts() {
        let mut adaptive = AdaptiveRho::new(false);
        let mut rho = 1.0;
        let mut zt = Col::<f64>::zeros(3);
        assert!(!adaptive.maybe_adjust(&mut rho, &mut zt, 100.0, 1.0, 0.01, 1.0));
        assert_eq!(rho, 1.0);
    }

    #[test]
    fn preserves_rho_zt_product() {
        let mut adaptive = AdaptiveRho::new(true);
        let mut rho = 2.0;
        let mut zt = Col::from_fn(2, |i| 3.0 + i as f64);
        let product_before: Vec<f64> = zt.iter().map(|&v| v * rho).collect();

        let adjusted = adaptive.maybe_adjust(&mut rho, &mut zt, 100.0, 1.0, 0.01, 1.0);
        assert!(adjusted);
        for (i, &before) in product_before.iter().enumerate() {
            assert!((zt[i] * rho - before).abs() < 1e-10);
        }
    }

    #[test]
    fn cooldown_blocks_consecutive_adjustment() {
        let mut adaptive = AdaptiveRho::new(true);
        let mut rho = 1.0;
        let mut zt = Col::<f64>::zeros(2);
        assert!(adaptive.maybe_adjust(&mut rho, &mut zt, 100.0, 1.0, 0.01, 1.0));
        assert!(!adaptive.maybe_adjust(&mut rho, &mut zt, 100.0, 1.0, 0.01, 1.0));
    }

    #[test]
    fn balanced_residuals_do_not_adjust() {
        let mut adaptive = AdaptiveRho::new(true);
        let mut rho = 1.0;
        let mut zt = Col::<f64>::zeros(2);
        assert!(!adaptive.maybe_adjust(&mut rho, &mut zt, 1.0, 1.0, 1.0, 1.0));
    }
}
