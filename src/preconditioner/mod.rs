//! Preconditioners for the Krylov backends.
//!
//! This module defines the Preconditioner trait and includes implementations
//! for point Jacobi, (symmetric) SOR and an aggregation-based algebraic
//! multigrid. Preconditioners act on the locally owned block of the operator;
//! across processes they combine as block Jacobi.

use crate::config::{PcKind, PcOptions};
use crate::error::Result;
use crate::matrix::CsrMatrix;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<()>;
    /// Optionally: setup/factorize from A
    fn setup(&mut self, _a: &CsrMatrix) -> Result<()> {
        Ok(())
    }
}

pub mod amg;
pub mod jacobi;
pub mod sor;

pub use amg::Amg;
pub use jacobi::Jacobi;
pub use sor::{MatSorType, Sor};

/// Build and set up the preconditioner selected by `opts` for the local
/// block `a`. Returns `None` for [`PcKind::None`].
pub fn build(opts: &PcOptions, a: &CsrMatrix) -> Result<Option<Box<dyn Preconditioner>>> {
    let mut pc: Box<dyn Preconditioner> = match opts.kind {
        PcKind::None => return Ok(None),
        PcKind::Jacobi => Box::new(Jacobi::new()),
        PcKind::Amg => Box::new(Amg::new(opts.clone())),
    };
    pc.setup(a)?;
    Ok(Some(pc))
}
