//! streamsolve: distributed barotropic streamfunction solver
//!
//! This crate assembles the 5-point elliptic operator of the depth-integrated
//! streamfunction on a structured, domain-decomposed ocean grid, folds
//! Dirichlet boundary values into the right-hand side and solves the system
//! with preconditioned Krylov methods (or a dense LU on small problems).
//!
//! The entry point for a host model is [`StreamfunctionSolver`]; the pieces it
//! is made of ([`assemble_poisson_matrix`], [`KspContext`],
//! [`inject_dirichlet`], [`enforce_boundaries`]) are public as well.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod grid;
pub mod matrix;
pub mod preconditioner;
pub mod solver;
pub mod streamfunction;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use core::*;
pub use error::*;
pub use grid::*;
pub use matrix::*;
pub use parallel::{Comm, ParallelContext, SerialComm};
pub use preconditioner::{Amg, Jacobi, MatSorType, Preconditioner, Sor};
pub use solver::*;
pub use streamfunction::*;
pub use utils::*;
