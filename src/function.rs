//! The elementwise convex function library and its proximal evaluator.
//!
//! Each coordinate of `f` (applied to `y`) or `g` (applied to `x`) is a
//! [`Term`]: a primitive `h` composed with an affine/quadratic wrapper,
//!
//! ```text
//! value(x) = c * h(a*x - b) + d*x + (e/2)*x^2
//! ```
//!
//! with an asymmetry weight `s` that rescales `h` (and its derivative, for
//! the Newton-solved primitives) on the negative half of its argument.

use faer::{Col, ColRef};

use crate::error::{PogsError, PogsResult};

const NEWTON_MAX_ITERS: usize = 100;
const NEWTON_TOL: f64 = 1e-10;

/// The closed set of elementary convex functions POGS can prox/evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Zero,
    Abs,
    Exp,
    Huber,
    Identity,
    IndBox01,
    IndEq0,
    IndGe0,
    IndLe0,
    Logistic,
    MaxNeg0,
    MaxPos0,
    NegEntr,
    NegLog,
    Recipr,
    Square,
}

/// One coordinate of a [`FunctionVector`].
///
/// `value(x) = c * h_s(a*x - b) + d*x + (e/2)*x^2`, where `h_s` applies the
/// asymmetry weight `s` to `h` (and its derivative) on the negative half of
/// its argument. Invariants: `c >= 0`, `e >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub h: Primitive,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub s: f64,
}

impl Default for Term {
    fn default() -> Self {
        // c=1, a=1, b=0, d=0, e=0, s=1: f(x) = h(x).
        Self {
            h: Primitive::Zero,
            a: 1.0,
            b: 0.0,
            c: 1.0,
            d: 0.0,
            e: 0.0,
            s: 1.0,
        }
    }
}

impl Term {
    pub fn new(h: Primitive, a: f64, b: f64, c: f64, d: f64, e: f64, s: f64) -> Self {
        Self { h, a, b, c, d, e, s }
    }

    /// Convenience constructor for the common `c * h(x)` case.
    pub fn of(h: Primitive) -> Self {
        Self { h, ..Default::default() }
    }

    fn validate(&self) -> PogsResult<()> {
        let finite = [self.a, self.b, self.c, self.d, self.e, self.s]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(PogsError::InvalidArgument(
                "function term has a non-finite parameter".into(),
            ));
        }
        if self.c < 0.0 {
            return Err(PogsError::InvalidArgument(format!(
                "function term coefficient c must be >= 0, got {}",
                self.c
            )));
        }
        if self.e < 0.0 {
            return Err(PogsError::InvalidArgument(format!(
                "function term coefficient e must be >= 0, got {}",
                self.e
            )));
        }
        if self.a == 0.0 {
            return Err(PogsError::InvalidArgument(
                "function term coefficient a must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// `c * h_s(a*x - b) + d*x + (e/2)*x^2`.
    fn value(&self, x: f64) -> f64 {
        let u = self.a * x - self.b;
        self.c * h_value_asym(self.h, u, self.s) + self.d * x + 0.5 * self.e * x * x
    }

    /// `prox_{h,rho}(v) = argmin_x c*h(a*x-b) + d*x + (e/2)*x^2 + (rho/2)(x-v)^2`.
    fn prox(&self, rho: f64, v: f64) -> PogsResult<f64> {
        debug_assert!(rho > 0.0);

        // Absorb the quadratic regularizer e and the linear term d into a
        // shifted point/penalty, reducing to prox_{c*h, rho'}(v').
        let rho_prime = self.e + rho;
        let v_prime = (rho * v - self.d) / rho_prime;

        if self.c == 0.0 {
            // The h-term contributes nothing; the quadratic is all that's left.
            return Ok(v_prime);
        }

        // Change of variables z = a*x - b reduces further to the "unit"
        // prox of h at an adjusted point and penalty.
        let w = self.a * v_prime - self.b;
        let rho_h = rho_prime / (self.a * self.a * self.c);

        let z = prox_unit(self.h, rho_h, w, self.s)?;

        Ok((z + self.b) / self.a)
    }
}

/// Base (unscaled) value of a primitive at `u`, `+inf` outside its domain.
fn h_value(h: Primitive, u: f64) -> f64 {
    match h {
        Primitive::Zero => 0.0,
        Primitive::Abs => u.abs(),
        Primitive::Exp => u.exp(),
        Primitive::Huber => {
            if u.abs() <= 1.0 {
                0.5 * u * u
            } else {
                u.abs() - 0.5
            }
        }
        Primitive::Identity => u,
        Primitive::IndBox01 => {
            if (0.0..=1.0).contains(&u) {
                0.0
            } else {
                f64::INFINITY
            }
        }
        Primitive::IndEq0 => {
            if u == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        }
        Primitive::IndGe0 => {
            if u >= 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        }
        Primitive::IndLe0 => {
            if u <= 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        }
        Primitive::Logistic => (1.0 + u.exp()).ln(),
        Primitive::MaxNeg0 => (-u).max(0.0),
        Primitive::MaxPos0 => u.max(0.0),
        Primitive::NegEntr => {
            if u > 0.0 {
                u * u.ln()
            } else if u == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        }
        Primitive::NegLog => {
            if u > 0.0 {
                -u.ln()
            } else {
                f64::INFINITY
            }
        }
        Primitive::Recipr => {
            if u > 0.0 {
                1.0 / u
            } else {
                f64::INFINITY
            }
        }
        Primitive::Square => 0.5 * u * u,
    }
}

/// Value of the asymmetric primitive `h_s`, `s` applied on `u < 0`.
fn h_value_asym(h: Primitive, u: f64, s: f64) -> f64 {
    if u < 0.0 { s * h_value(h, u) } else { h_value(h, u) }
}

/// `argmin_z h_s(z) + (rho/2)(z - w)^2` for the unit (`c=1`) primitive.
fn prox_unit(h: Primitive, rho: f64, w: f64, s: f64) -> PogsResult<f64> {
    let z = match h {
        Primitive::Zero => w,
        Primitive::Abs => prox_piecewise_linear(w, rho, 1.0, -s),
        Primitive::Identity => prox_piecewise_linear(w, rho, 1.0, s),
        Primitive::MaxPos0 => prox_piecewise_linear(w, rho, 1.0, 0.0),
        Primitive::MaxNeg0 => prox_piecewise_linear(w, rho, 0.0, -s),
        Primitive::Square => {
            if w >= 0.0 {
                rho * w / (1.0 + rho)
            } else {
                rho * w / (s + rho)
            }
        }
        Primitive::IndBox01 => w.clamp(0.0, 1.0),
        Primitive::IndEq0 => 0.0,
        Primitive::IndGe0 => w.max(0.0),
        Primitive::IndLe0 => w.min(0.0),
        Primitive::NegLog => {
            // rho*z^2 - rho*w*z - 1 = 0, positive root.
            (w + (w * w + 4.0 / rho).sqrt()) / 2.0
        }
        Primitive::Huber => prox_huber(w, rho, s),
        Primitive::Exp => newton_solve(
            |z| weight(z, s) * z.exp() + rho * (z - w),
            |z| weight(z, s) * z.exp() + rho,
            w,
        )?,
        Primitive::Logistic => newton_solve(
            |z| {
                let sig = 1.0 / (1.0 + (-z).exp());
                weight(z, s) * sig + rho * (z - w)
            },
            |z| {
                let sig = 1.0 / (1.0 + (-z).exp());
                weight(z, s) * sig * (1.0 - sig) + rho
            },
            w,
        )?,
        Primitive::NegEntr => {
            let z0 = w.max(1e-8);
            newton_solve(
                |z| z.max(1e-300).ln() + 1.0 + rho * (z - w),
                |z| 1.0 / z.max(1e-300) + rho,
                z0,
            )?
            .max(0.0)
        }
        Primitive::Recipr => {
            let z0 = w.max(1e-8);
            newton_solve(
                |z| -1.0 / (z * z) + rho * (z - w),
                |z| 2.0 / (z * z * z) + rho,
                z0,
            )?
        }
    };
    Ok(z)
}

/// Derivative weight for asymmetric primitives solved by Newton's method:
/// `1` on the nonnegative half, `s` on the negative half.
fn weight(z: f64, s: f64) -> f64 {
    if z < 0.0 { s } else { 1.0 }
}

/// `argmin_z` of a piecewise-linear term with derivative `kplus` on `z > 0`
/// and `kminus` on `z < 0` (`kminus <= kplus` for convexity), plus the
/// proximal quadratic. Generalizes soft-thresholding to asymmetric slopes.
fn prox_piecewise_linear(w: f64, rho: f64, kplus: f64, kminus: f64) -> f64 {
    if w >= kplus / rho {
        w - kplus / rho
    } else if w <= kminus / rho {
        w - kminus / rho
    } else {
        0.0
    }
}

fn prox_huber(w: f64, rho: f64, s: f64) -> f64 {
    // Four candidate branches, ordered from most-positive to most-negative;
    // exactly one satisfies its own interval by convexity.
    let z_b = w - 1.0 / rho; // z > 1
    if z_b > 1.0 {
        return z_b;
    }
    let z_a = rho * w / (1.0 + rho); // 0 <= z <= 1
    if (0.0..=1.0).contains(&z_a) {
        return z_a;
    }
    let z_c = rho * w / (s + rho); // -1 <= z < 0
    if (-1.0..0.0).contains(&z_c) {
        return z_c;
    }
    w + s / rho // z < -1
}

/// Bounded Newton solve for the scalar equation `g(z) = 0`, `g` strictly
/// increasing (as guaranteed by convexity of the composed prox objective).
fn newton_solve(
    g: impl Fn(f64) -> f64,
    g_prime: impl Fn(f64) -> f64,
    z0: f64,
) -> PogsResult<f64> {
    let mut z = z0;
    for _ in 0..NEWTON_MAX_ITERS {
        let gv = g(z);
        if gv.abs() < NEWTON_TOL {
            return Ok(z);
        }
        let gp = g_prime(z);
        if !gp.is_finite() || gp.abs() < 1e-300 {
            return Err(PogsError::NumericalFailure(
                "prox Newton solve encountered a singular derivative".into(),
            ));
        }
        let step = gv / gp;
        let mut z_next = z - step;
        if !z_next.is_finite() {
            return Err(PogsError::NumericalFailure(
                "prox Newton solve diverged".into(),
            ));
        }
        // Damp wild first steps so domain-restricted primitives (NegEntr,
        // Recipr) don't jump outside their feasible half-line.
        if z_next <= 0.0 && z > 0.0 {
            z_next = 0.5 * z;
        }
        z = z_next;
    }
    Err(PogsError::NumericalFailure(
        "prox Newton solve did not converge within the iteration budget".into(),
    ))
}

/// An ordered, fixed-length sequence of [`Term`]s — one per row/column of
/// the block (`f` on `y`, `g` on `x`).
#[derive(Debug, Clone)]
pub struct FunctionVector {
    terms: Vec<Term>,
}

impl FunctionVector {
    pub fn new(terms: Vec<Term>) -> PogsResult<Self> {
        for t in &terms {
            t.validate()?;
        }
        Ok(Self { terms })
    }

    pub fn zeros(n: usize) -> Self {
        Self { terms: vec![Term::of(Primitive::Zero); n] }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// `out[i] = prox_{f_i,rho}(v[i])` elementwise.
    pub fn prox(&self, rho: f64, v: ColRef<f64>, out: &mut Col<f64>) -> PogsResult<()> {
        assert_eq!(v.nrows(), self.terms.len());
        assert_eq!(out.nrows(), self.terms.len());
        for i in 0..self.terms.len() {
            out[i] = self.terms[i].prox(rho, v[i])?;
        }
        Ok(())
    }

    /// `sum_i value_i(v[i])`.
    pub fn value(&self, v: ColRef<f64>) -> f64 {
        assert_eq!(v.nrows(), self.terms.len());
        self.terms
            .iter()
            .zip(v.iter())
            .map(|(t, &x)| t.value(x))
            .sum()
    }

    /// Rescales each term in place by a diagonal scaling vector, matching
    /// the identity that lets the solver operate in equilibrated
    /// coordinates: `f`-terms (on `y`) scale `a, d, e` by `delta`;
    /// `g`-terms (on `x`) scale them by `1/delta`.
    pub fn scale_f(&mut self, d: ColRef<f64>) {
        assert_eq!(d.nrows(), self.terms.len());
        for (t, &delta) in self.terms.iter_mut().zip(d.iter()) {
            t.a *= delta;
            t.d *= delta;
            t.e *= delta;
        }
    }

    pub fn scale_g(&mut self, e: ColRef<f64>) {
        assert_eq!(e.nrows(), self.terms.len());
        for (t, &delta) in self.terms.iter_mut().zip(e.iter()) {
            t.a /= delta;
            t.d /= delta;
            t.e /= delta;
        }
    }
}
