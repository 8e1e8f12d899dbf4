//! Shared helpers for the iterative solvers.

pub mod convergence;
pub use convergence::{ConvergedReason, Convergence, SolveStats};
