//! Settings, reporting structures (`Info`, `Output`, `Residuals`,
//! `Tolerances`, `Objectives`), and the convergence test (spec.md §4.5)
//! consumed by the solver driver in `lib.rs`.

use std::time::Duration;

use faer::{Col, ColRef};
use serde::{Deserialize, Serialize};

use crate::admm::anderson::DEFAULT_WINDOW;
use crate::admm::state::{AdmmState, x, y};
use crate::function::FunctionVector;
use crate::linalg::projector::GraphProjector;

/// Solver configuration. `Default` matches spec.md §6's default-settings
/// table exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Over-relaxation, typically in `(0, 2)`.
    pub alpha: f64,
    /// Initial ADMM penalty.
    pub rho: f64,
    pub abstol: f64,
    pub reltol: f64,
    pub maxiter: usize,
    /// Verbosity level for the default logging callback (0 = silent).
    pub verbose: u32,
    /// Suppresses the default logging callback even when `verbose > 0`.
    pub suppress: bool,
    pub adaptiverho: bool,
    pub gapstop: bool,
    pub warmstart: bool,
    pub resume: bool,
    pub accelerate: bool,
    /// Anderson acceleration window size, consulted only when `accelerate`
    /// is set. Not part of spec.md §6's default-settings table.
    pub accel_memory: usize,
    /// Warm-start primal guess, original (unscaled) coordinates, length `n`.
    pub x0: Option<Vec<f64>>,
    /// Warm-start dual guess, original (unscaled) coordinates, length `m`.
    pub nu0: Option<Vec<f64>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alpha: 1.7,
            rho: 1.0,
            abstol: 1e-4,
            reltol: 1e-3,
            maxiter: 2000,
            verbose: 2,
            suppress: false,
            adaptiverho: true,
            gapstop: false,
            warmstart: false,
            resume: false,
            accelerate: false,
            accel_memory: DEFAULT_WINDOW,
            x0: None,
            nu0: None,
        }
    }
}

/// A sparse patch of [`Settings`] fields, applied with [`Settings::update`]
/// (the `update_settings(dst, src)` operation of spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub alpha: Option<f64>,
    pub rho: Option<f64>,
    pub abstol: Option<f64>,
    pub reltol: Option<f64>,
    pub maxiter: Option<usize>,
    pub verbose: Option<u32>,
    pub suppress: Option<bool>,
    pub adaptiverho: Option<bool>,
    pub gapstop: Option<bool>,
    pub warmstart: Option<bool>,
    pub resume: Option<bool>,
    pub accelerate: Option<bool>,
    pub accel_memory: Option<usize>,
    pub x0: Option<Vec<f64>>,
    pub nu0: Option<Vec<f64>>,
}

impl Settings {
    /// Merges every `Some` field of `patch` into `self`.
    pub fn update(&mut self, patch: &SettingsPatch) {
        macro_rules! apply {
            ($field:ident) => {
                if let Some(v) = patch.$field.clone() {
                    self.$field = v;
                }
            };
        }
        apply!(alpha);
        apply!(rho);
        apply!(abstol);
        apply!(reltol);
        apply!(maxiter);
        apply!(verbose);
        apply!(suppress);
        apply!(adaptiverho);
        apply!(gapstop);
        apply!(warmstart);
        apply!(resume);
        apply!(accelerate);
        apply!(accel_memory);
        // x0/nu0 are `Option<Vec<f64>>` on both `Settings` and `SettingsPatch`
        // (a patched warm start is itself optional), so `apply!` (which
        // unwraps one layer of `Option`) doesn't fit: assign the patch field
        // through whenever the patch carries one at all.
        if patch.x0.is_some() {
            self.x0 = patch.x0.clone();
        }
        if patch.nu0.is_some() {
            self.nu0 = patch.nu0.clone();
        }
    }
}

/// Residual norms (spec.md §4.5), in equilibrated coordinates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Residuals {
    pub primal: f64,
    pub dual: f64,
    pub gap: f64,
}

/// Convergence tolerances (spec.md §4.5), plus the precomputed
/// dimension-only terms `atolm = abstol*sqrt(m)`, `atoln = abstol*sqrt(n)`,
/// `atolmn = abstol*sqrt(m+n)` spec.md §3 names as a distinct entity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Tolerances {
    pub primal: f64,
    pub dual: f64,
    pub gap: f64,
    pub atolm: f64,
    pub atoln: f64,
    pub atolmn: f64,
}

/// Objective estimates. `dual` is `primal - gap`: a cheap estimate from the
/// already-computed duality gap rather than a second evaluation through
/// the convex conjugates of `f`, `g` (spec.md does not specify the dual
/// objective's exact formula; this is a documented simplification, see
/// `DESIGN.md`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Objectives {
    pub primal: f64,
    pub dual: f64,
    pub gap: f64,
}

/// Run-report (spec.md §3's `Info` entity). `err` is deliberately absent:
/// the public API surfaces failures through `Result<_, PogsError>` instead
/// of a status code field (see `DESIGN.md`).
#[derive(Debug, Clone, Default)]
pub struct Info {
    pub k: usize,
    pub converged: bool,
    pub rho: f64,
    pub residuals: Residuals,
    pub tolerances: Tolerances,
    pub objectives: Objectives,
    pub setup_time: Duration,
    pub solve_time: Duration,
}

/// Solver output in original (unscaled, user) coordinates.
#[derive(Debug, Clone)]
pub struct Output {
    pub x: Col<f64>,
    pub y: Col<f64>,
    pub mu: Col<f64>,
    pub nu: Col<f64>,
}

/// Evaluates the spec.md §4.5 convergence test against the current
/// half-iterates (`z12`, `zt12`). `f_scaled`/`g_scaled` must already be in
/// equilibrated coordinates (post `FunctionVector::scale_f`/`scale_g`).
pub fn evaluate_convergence(
    state: &AdmmState,
    projector: &GraphProjector,
    f_scaled: &FunctionVector,
    g_scaled: &FunctionVector,
    settings: &Settings,
) -> (Residuals, Tolerances, Objectives, bool) {
    let (m, n) = (state.m(), state.n());

    let y12: ColRef<f64> = y(state.z12.as_ref(), m);
    let x12: ColRef<f64> = x(state.z12.as_ref(), m, n);
    let yt12: ColRef<f64> = y(state.zt12.as_ref(), m);
    let xt12: ColRef<f64> = x(state.zt12.as_ref(), m, n);

    let ax12 = projector.matrix() * x12;
    let r_p = Col::from_fn(m, |i| ax12[i] - y12[i]).norm_l2();

    let at_yt12 = projector.apply_transpose(yt12);
    let r_d = Col::from_fn(n, |i| at_yt12[i] + xt12[i]).norm_l2();

    let gap = {
        let y_term: f64 = (0..m).map(|i| y12[i] * yt12[i]).sum();
        let x_term: f64 = (0..n).map(|i| x12[i] * xt12[i]).sum();
        (y_term + x_term).abs()
    };

    let atolm = settings.abstol * (m as f64).sqrt();
    let atoln = settings.abstol * (n as f64).sqrt();
    let atolmn = settings.abstol * ((m + n) as f64).sqrt();

    let eps_p = atolm + settings.reltol * y12.norm_l2();
    let eps_d = atoln + settings.reltol * xt12.norm_l2();

    let primal_obj = f_scaled.value(y12) + g_scaled.value(x12);
    let dual_obj = primal_obj - gap;

    let eps_gap = atolmn + settings.reltol * primal_obj.abs();

    let mut converged = r_p <= eps_p && r_d <= eps_d;
    if settings.gapstop {
        converged = converged && gap <= eps_gap;
    }

    (
        Residuals { primal: r_p, dual: r_d, gap },
        Tolerances { primal: eps_p, dual: eps_d, gap: eps_gap, atolm, atoln, atolmn },
        Objectives { primal: primal_obj, dual: dual_obj, gap },
        converged,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = Settings::default();
        assert_eq!(s.alpha, 1.7);
        assert_eq!(s.rho, 1.0);
        assert_eq!(s.abstol, 1e-4);
        assert_eq!(s.reltol, 1e-3);
        assert_eq!(s.maxiter, 2000);
        assert_eq!(s.verbose, 2);
        assert!(!s.suppress);
        assert!(s.adaptiverho);
        assert!(!s.gapstop);
        assert!(!s.warmstart);
        assert!(!s.resume);
        assert!(!s.accelerate);
    }

    #[test]
    fn update_only_touches_patched_fields() {
        let mut s = Settings::default();
        let patch = SettingsPatch { rho: Some(5.0), maxiter: Some(10), ..Default::default() };
        s.update(&patch);
        assert_eq!(s.rho, 5.0);
        assert_eq!(s.maxiter, 10);
        assert_eq!(s.alpha, 1.7); // untouched
    }
}
