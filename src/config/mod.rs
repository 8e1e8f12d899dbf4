//! Solver configuration.

pub mod options;
pub use options::{PcKind, PcOptions, RelaxType, Settings, SolverKind};
