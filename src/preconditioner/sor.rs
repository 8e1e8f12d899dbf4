use bitflags::bitflags;

use crate::error::{Result, StreamError};
use crate::matrix::CsrMatrix;
use crate::preconditioner::Preconditioner;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct MatSorType: u32 {
        const APPLY_LOWER              = 0b000_00010; // forward Gauss–Seidel
        const APPLY_UPPER              = 0b000_00100; // backward
        const SYMMETRIC_SWEEP          = Self::APPLY_LOWER.bits() | Self::APPLY_UPPER.bits();
    }
}

/// Successive over-relaxation on a CSR matrix, starting from a zero guess.
///
/// With [`MatSorType::SYMMETRIC_SWEEP`] every iteration is a forward sweep
/// followed by a backward one, which keeps the preconditioner symmetric for a
/// symmetric operator.
#[derive(Clone)]
pub struct Sor {
    pub its: usize,
    pub sym: MatSorType,
    pub omega: f64,
    inv_diag: Vec<f64>,
    a: Option<CsrMatrix>,
}

impl Sor {
    pub fn new(omega: f64, its: usize, sym: MatSorType) -> Self {
        Self { its, sym, omega, inv_diag: Vec::new(), a: None }
    }

    /// Symmetric SOR with `its` iterations.
    pub fn symmetric(omega: f64, its: usize) -> Self {
        Self::new(omega, its, MatSorType::SYMMETRIC_SWEEP)
    }

    fn relax_row(&self, a: &CsrMatrix, i: usize, b: &[f64], y: &mut [f64]) {
        let (cols, vals) = a.row(i);
        let sigma: f64 = cols
            .iter()
            .zip(vals)
            .filter(|&(&j, _)| j != i)
            .map(|(&j, &v)| v * y[j])
            .sum();
        let gs = (b[i] - sigma) * self.inv_diag[i];
        y[i] = (1.0 - self.omega) * y[i] + self.omega * gs;
    }
}

impl Preconditioner for Sor {
    fn setup(&mut self, a: &CsrMatrix) -> Result<()> {
        let diag = a.diagonal();
        self.inv_diag = Vec::with_capacity(diag.len());
        for (i, d) in diag.into_iter().enumerate() {
            if d == 0.0 {
                return Err(StreamError::ZeroPivot(i));
            }
            self.inv_diag.push(1.0 / d);
        }
        self.a = Some(a.clone());
        Ok(())
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<()> {
        let a = self
            .a
            .as_ref()
            .ok_or(StreamError::Unsupported("SOR applied before setup"))?;
        let n = x.len();
        y.fill(0.0);
        for _ in 0..self.its {
            if self.sym.contains(MatSorType::APPLY_LOWER) {
                for i in 0..n {
                    self.relax_row(a, i, x, y);
                }
            }
            if self.sym.contains(MatSorType::APPLY_UPPER) {
                for i in (0..n).rev() {
                    self.relax_row(a, i, x, y);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;
    use approx::assert_relative_eq;

    fn tridiag(n: usize) -> CsrMatrix {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, n, &t)
    }

    #[test]
    fn forward_sweep_is_gauss_seidel() {
        let a = tridiag(3);
        let mut sor = Sor::new(1.0, 1, MatSorType::APPLY_LOWER);
        sor.setup(&a).unwrap();
        let mut y = vec![0.0; 3];
        sor.apply(&[4.0, 4.0, 4.0], &mut y).unwrap();
        assert_relative_eq!(y[0], 1.0);
        assert_relative_eq!(y[1], 1.25);
        assert_relative_eq!(y[2], 1.3125);
    }

    #[test]
    fn many_symmetric_sweeps_converge_to_the_solution() {
        let a = tridiag(8);
        let x_true: Vec<f64> = (0..8).map(|i| i as f64 - 3.5).collect();
        let mut b = vec![0.0; 8];
        a.spmv(&x_true, &mut b);
        let mut sor = Sor::symmetric(1.2, 40);
        sor.setup(&a).unwrap();
        let mut y = vec![0.0; 8];
        sor.apply(&b, &mut y).unwrap();
        for (yi, xi) in y.iter().zip(&x_true) {
            assert_relative_eq!(yi, xi, epsilon = 1e-10);
        }
    }

    #[test]
    fn zero_diagonal_is_rejected() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 0, 1.0)]);
        let mut sor = Sor::symmetric(1.0, 1);
        assert_eq!(sor.setup(&a), Err(StreamError::ZeroPivot(1)));
    }
}
