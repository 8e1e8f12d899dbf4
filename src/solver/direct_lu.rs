//! Direct dense solver using Faer's LU factorization with partial pivoting.
//!
//! Factors a dense copy of the whole operator once, at construction; every
//! solve is then a pair of triangular solves. Only meaningful on a single
//! process and for small grids.
//!
//! # References
//! - Faer documentation: https://github.com/sarah-ek/faer-rs
//! - Golub & Van Loan, Matrix Computations

use faer::linalg::solvers::{PartialPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::{Result, StreamError};
use crate::preconditioner::Preconditioner;
use crate::solver::{residual, LinearSolver};
use crate::utils::convergence::{ConvergedReason, SolveStats};

/// Factor the square matrix `a` and check that the factors are usable.
///
/// The check solves `A·x = A·1` once: a singular or overflowing factorization
/// shows up as a non-finite `x`.
pub(crate) fn factor_dense(a: &Mat<f64>) -> Result<PartialPivLu<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(StreamError::Shape(format!("LU needs a square matrix, got {n}x{}", a.ncols())));
    }
    for j in 0..n {
        for i in 0..n {
            if !a[(i, j)].is_finite() {
                return Err(StreamError::Factor(format!("non-finite entry at ({i}, {j})")));
            }
        }
    }
    let factor = PartialPivLu::new(a.as_ref());
    let mut check = vec![0.0; n];
    a.matvec(&vec![1.0; n], &mut check);
    lu_solve_in_place(&factor, &mut check);
    if let Some(k) = check.iter().position(|v| !v.is_finite()) {
        return Err(StreamError::Factor(format!(
            "{n}x{n} factorization is singular or unstable (row {k} of a test solve is not finite)"
        )));
    }
    Ok(factor)
}

/// Overwrite `x` with A⁻¹ x.
pub(crate) fn lu_solve_in_place(factor: &PartialPivLu<f64>, x: &mut [f64]) {
    let n = x.len();
    factor.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(x, n, 1));
}

/// LU solver using partial pivoting from Faer.
pub struct LuSolver {
    factor: PartialPivLu<f64>,
    n: usize,
}

impl LuSolver {
    /// Factor the square matrix `a`.
    pub fn new(a: &Mat<f64>) -> Result<Self> {
        Ok(Self { factor: factor_dense(a)?, n: a.nrows() })
    }

    /// x = A⁻¹ b with the cached factorization.
    pub fn solve_cached(&self, b: &[f64], x: &mut [f64]) {
        x.copy_from_slice(b);
        lu_solve_in_place(&self.factor, x);
    }
}

impl LinearSolver for LuSolver {
    /// Direct solve; the preconditioner is ignored. Reports one iteration and
    /// the true residual norm.
    fn solve(
        &mut self,
        a: &dyn MatVec,
        _pc: Option<&dyn Preconditioner>,
        ip: &dyn InnerProduct,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<SolveStats<f64>> {
        if b.len() != self.n || x.len() != self.n {
            return Err(StreamError::Shape(format!(
                "LU factor is {n}x{n}, vectors have length {} and {}",
                b.len(),
                x.len(),
                n = self.n
            )));
        }
        if ip.norm(b) == 0.0 {
            x.fill(0.0);
            return Ok(SolveStats::new(0, 0.0, ConvergedReason::ConvergedAtol));
        }
        self.solve_cached(b, x);
        let mut r = vec![0.0; self.n];
        residual(a, b, x, &mut r);
        let res = ip.norm(&r);
        let reason = if res.is_finite() {
            ConvergedReason::ConvergedRtol
        } else {
            ConvergedReason::DivergedNanOrInf
        };
        Ok(SolveStats::new(1, res, reason))
    }

    fn name(&self) -> &'static str {
        "lu"
    }
}
