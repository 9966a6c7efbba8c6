//! Save/load of solver state (spec.md §6): persists the equilibrated
//! iterate so a solve can resume exactly, or re-seed a fresh [`GraphProjector`]
//! against the caller's own (unchanged) matrix.
//!
//! Field names mirror the `A_equil`/`LLT`/`d`/`e`/`z`/`z12`/`zt`/`zt12`/
//! `zprev`/`rho` snapshot used by POGS's reference Python bindings. `faer`'s
//! dense types aren't `Serialize`, so the wire format flattens everything to
//! plain `Vec<f64>`.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{PogsError, PogsResult};

/// A complete solver snapshot: equilibrated matrix, scales, and iterate.
/// Produced by `Pogs::export_solver`, consumed by `Pogs::load_solver`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSnapshot {
    pub m: usize,
    pub n: usize,
    /// Row-major flatten of the equilibrated matrix `A'` (`m*n` entries).
    pub a_equil: Vec<f64>,
    pub d: Vec<f64>,
    pub e: Vec<f64>,
    pub z: Vec<f64>,
    pub z12: Vec<f64>,
    pub zt: Vec<f64>,
    pub zt12: Vec<f64>,
    pub zprev: Vec<f64>,
    pub rho: f64,
}

/// Just the iterate and scales, without the matrix. Produced by
/// `Pogs::save_state`, consumed by `Pogs::load_state` against an
/// already-`init`ialized (same-matrix) solver — the loader re-derives the
/// `GraphProjector` from the solver's own cached equilibration rather than
/// persisting the Cholesky factor, which spec.md §6 only asks to "tolerate
/// absent" on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateOnly {
    pub m: usize,
    pub n: usize,
    pub d: Vec<f64>,
    pub e: Vec<f64>,
    pub z: Vec<f64>,
    pub z12: Vec<f64>,
    pub zt: Vec<f64>,
    pub zt12: Vec<f64>,
    pub zprev: Vec<f64>,
    pub rho: f64,
}

pub fn write_json<W: Write, T: Serialize>(w: W, value: &T) -> PogsResult<()> {
    serde_json::to_writer_pretty(w, value)
        .map_err(|e| PogsError::ResourceExhaustion(format!("failed to write solver snapshot: {e}")))
}

pub fn read_json<R: Read, T: for<'de> Deserialize<'de>>(r: R) -> PogsResult<T> {
    serde_json::from_reader(r)
        .map_err(|e| PogsError::InvalidArgument(format!("failed to parse solver snapshot: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_round_trips_through_json() {
        let snapshot = StateOnly {
            m: 2,
            n: 3,
            d: vec![1.0, 1.0],
            e: vec![1.0, 1.0, 1.0],
            z: vec![0.0; 5],
            z12: vec![0.0; 5],
            zt: vec![0.0; 5],
            zt12: vec![0.0; 5],
            zprev: vec![0.0; 5],
            rho: 1.0,
        };

        let mut buf = Vec::new();
        write_json(&mut buf, &snapshot).unwrap();
        let restored: StateOnly = read_json(buf.as_slice()).unwrap();
        assert_eq!(restored.m, snapshot.m);
        assert_eq!(restored.rho, snapshot.rho);
        assert_eq!(restored.d, snapshot.d);
    }

    #[test]
    fn malformed_json_is_an_invalid_argument() {
        let err = read_json::<_, StateOnly>("not json".as_bytes()).unwrap_err();
        assert!(matches!(err, PogsError::InvalidArgument(_)));
    }
}
