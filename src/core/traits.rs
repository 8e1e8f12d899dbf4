//! Core linear-algebra traits for streamsolve.

/// Matrix–vector product: y ← A x over the locally owned rows.
pub trait MatVec {
    /// Compute y = A · x.
    fn matvec(&self, x: &[f64], y: &mut [f64]);
}

/// Inner products & norms.
///
/// Distributed implementations reduce over every process of the
/// communicator, so all ranks must call them collectively.
pub trait InnerProduct {
    /// Compute dot(x, y).
    fn dot(&self, x: &[f64], y: &[f64]) -> f64;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &[f64]) -> f64 {
        self.dot(x, x).sqrt()
    }
}
