//! Solver engine: the assembled operator bound to a Krylov (or direct)
//! backend and its preconditioner, in the manner of PETSc's `KSP` object.

pub mod ksp_context;
pub use ksp_context::KspContext;
