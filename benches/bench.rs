//! Benchmarks for the POGS solve loop over a handful of problem sizes and
//! function combinations, following the teacher's `divan`-driven bench
//! harness (`benches/lp/netlib.rs`'s `#[divan::bench]`-per-case style,
//! simplified here since there is no fixed external problem set like
//! netlib's LPs to load cases from).

use faer::Mat;
use pogs::function::{FunctionVector, Primitive, Term};
use pogs::{EquilibrationKind, Pogs, Settings};

fn main() {
    divan::main();
}

fn random_matrix(m: usize, n: usize) -> Mat<f64> {
    // A fixed, cheaply-computed pattern rather than a seeded RNG: deterministic
    // across runs, which matters for comparing divan samples.
    Mat::from_fn(m, n, |i, j| {
        let v = ((i * 31 + j * 17 + 7) % 23) as f64 - 11.0;
        v / 5.0 + if i == j % m { 1.0 } else { 0.0 }
    })
}

fn least_squares_problem(m: usize, n: usize) -> (Mat<f64>, FunctionVector, FunctionVector) {
    let a = random_matrix(m, n);
    let f = FunctionVector::new(
        (0..m)
            .map(|i| Term::new(Primitive::Square, 1.0, (i as f64) * 0.1 - 1.0, 1.0, 0.0, 0.0, 1.0))
            .collect(),
    )
    .unwrap();
    let g = FunctionVector::zeros(n);
    (a, f, g)
}

#[divan::bench(args = [(30, 20), (100, 60), (200, 150)])]
fn setup(case: (usize, usize)) {
    let (a, _f, _g) = least_squares_problem(case.0, case.1);
    divan::black_box(Pogs::init(a.as_ref(), EquilibrationKind::Sinkhorn).unwrap());
}

#[divan::bench(args = [(30, 20), (100, 60), (200, 150)])]
fn solve_least_squares(case: (usize, usize)) {
    let (a, f, g) = least_squares_problem(case.0, case.1);
    let mut solver = Pogs::init(a.as_ref(), EquilibrationKind::Sinkhorn).unwrap();
    let settings = Settings { maxiter: 200, ..Settings::default() };
    divan::black_box(solver.solve(&f, &g, &settings).unwrap());
}

#[divan::bench(args = [(30, 20), (100, 60)])]
fn solve_non_negative_least_squares(case: (usize, usize)) {
    let (a, f, _g) = least_squares_problem(case.0, case.1);
    let g = FunctionVector::new(vec![Term::of(Primitive::IndGe0); case.1]).unwrap();
    let mut solver = Pogs::init(a.as_ref(), EquilibrationKind::Sinkhorn).unwrap();
    let settings = Settings { maxiter: 200, ..Settings::default() };
    divan::black_box(solver.solve(&f, &g, &settings).unwrap());
}
