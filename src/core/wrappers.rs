//! Trait implementations for faer dense matrices and distributed vectors.
//!
//! Dense `faer::Mat` operators are used for the direct backend, for the
//! coarsest multigrid level and throughout the tests. Vector inner products
//! are always routed through a [`Comm`] so the same Krylov code runs on one
//! process or on many.

use crate::core::traits::{InnerProduct, MatVec};
use crate::parallel::Comm;
use faer::Mat;

/// Implements matrix-vector multiplication for `faer::Mat`.
impl MatVec for Mat<f64> {
    fn matvec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for i in 0..self.nrows() {
            y[i] = 0.0;
            for j in 0..self.ncols() {
                y[i] += self[(i, j)] * x[j];
            }
        }
    }
}

/// Inner product and norm reduced across every process of a communicator.
pub struct DistributedInnerProduct<'a> {
    /// Reference to the communicator implementing the `Comm` trait.
    pub comm: &'a dyn Comm,
}

impl<'a> DistributedInnerProduct<'a> {
    pub fn new(comm: &'a dyn Comm) -> Self {
        Self { comm }
    }
}

impl InnerProduct for DistributedInnerProduct<'_> {
    fn dot(&self, x: &[f64], y: &[f64]) -> f64 {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        self.comm.all_reduce(local_dot(x, y))
    }
}

/// Process-local dot product, parallelised with rayon when enabled.
pub fn local_dot(x: &[f64], y: &[f64]) -> f64 {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        x.par_iter()
            .zip(y.par_iter())
            .map(|(xi, yi)| xi * yi)
            .sum()
    }
    #[cfg(not(feature = "rayon"))]
    {
        x.iter().zip(y.iter()).map(|(xi, yi)| xi * yi).sum()
    }
}
