// Jacobi preconditioner implementation

use crate::error::Result;
use crate::matrix::CsrMatrix;
use crate::preconditioner::Preconditioner;

/// Jacobi preconditioner: M⁻¹ = ω D⁻¹
#[derive(Debug, Clone)]
pub struct Jacobi {
    pub(crate) inv_diag: Vec<f64>,
    omega: f64,
}

impl Jacobi {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new(), omega: 1.0 }
    }

    /// Damped variant, used as a multigrid smoother.
    pub fn with_damping(omega: f64) -> Self {
        Self { inv_diag: Vec::new(), omega }
    }
}

impl Default for Jacobi {
    fn default() -> Self {
        Self::new()
    }
}

impl Preconditioner for Jacobi {
    fn setup(&mut self, a: &CsrMatrix) -> Result<()> {
        self.inv_diag = a
            .diagonal()
            .into_iter()
            .map(|d| if d != 0.0 { self.omega / d } else { 0.0 })
            .collect();
        Ok(())
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<()> {
        for ((yi, &xi), &di) in y.iter_mut().zip(x).zip(&self.inv_diag) {
            *yi = di * xi;
        }
        Ok(())
    }
}
