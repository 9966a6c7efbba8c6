//! ADMM iterate state and the per-iteration step kernels.

pub mod adaptive;
pub mod anderson;
pub mod state;
pub mod step;

pub use adaptive::AdaptiveRho;
pub use state::AdmmState;
