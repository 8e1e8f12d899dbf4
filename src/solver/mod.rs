//! Krylov & direct solver interfaces.
//!
//! Every backend solves the distributed system through the same seams: the
//! operator as a [`MatVec`], reductions through an [`InnerProduct`] and an
//! optional [`Preconditioner`] acting on the local block. All processes must
//! call `solve` together.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::Result;
use crate::preconditioner::Preconditioner;
use crate::utils::convergence::SolveStats;

/// Common interface for any direct or iterative solver.
pub trait LinearSolver {
    /// Solve A·x = b, writing result into `x` (which holds the initial guess).
    /// Returns iteration stats (including convergence info); failing to
    /// converge is not an error.
    fn solve(
        &mut self,
        a: &dyn MatVec,
        pc: Option<&dyn Preconditioner>,
        ip: &dyn InnerProduct,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<SolveStats<f64>>;

    /// Short name used in log records.
    fn name(&self) -> &'static str;
}

pub mod bicgstab;
pub mod direct_lu;
pub mod gmres;

pub use bicgstab::BiCgStabSolver;
pub use direct_lu::LuSolver;
pub use gmres::GmresSolver;

/// r = b − A x
pub(crate) fn residual(a: &dyn MatVec, b: &[f64], x: &[f64], r: &mut [f64]) {
    a.matvec(x, r);
    r.iter_mut().zip(b).for_each(|(ri, bi)| *ri = bi - *ri);
}

/// z = M⁻¹ r, or a copy of r without preconditioner.
pub(crate) fn precondition(
    pc: Option<&dyn Preconditioner>,
    r: &[f64],
    z: &mut [f64],
) -> Result<()> {
    match pc {
        Some(pc) => pc.apply(r, z),
        None => {
            z.copy_from_slice(r);
            Ok(())
        }
    }
}
