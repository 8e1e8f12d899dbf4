//! Generalized Minimal Residual (GMRES) solver with fixed restart (Saad §9.3.2)
//!
//! Restarted GMRES with right preconditioning: the Arnoldi process runs on
//! A·M⁻¹ so the residual estimate tracked by the Givens rotations is the true
//! (unpreconditioned) residual, and the update is x ← x + M⁻¹·V·y. The
//! implementation includes happy breakdown detection and double (iterative)
//! Gram-Schmidt orthogonalization.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM.
//! - https://en.wikipedia.org/wiki/Generalized_minimal_residual_method

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::Result;
use crate::preconditioner::Preconditioner;
use crate::solver::{precondition, residual, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

/// Relative size of a subdiagonal entry below which the Krylov space is
/// considered invariant.
const HAPPY_BREAKDOWN_TOL: f64 = 1e-14;

/// GMRES solver struct with restart and convergence options.
#[derive(Clone, Debug)]
pub struct GmresSolver {
    /// Number of Arnoldi vectors before restart
    pub restart: usize,
    /// Convergence criteria (tolerance and max iterations)
    pub conv: Convergence<f64>,
}

impl GmresSolver {
    /// Create a new GMRES solver with restart, relative tolerance, and max iterations.
    pub fn new(restart: usize, rtol: f64, max_iters: usize) -> Self {
        Self { restart: restart.max(1), conv: Convergence::new(rtol, max_iters) }
    }

    /// Orthogonalize `w` against `basis` twice, storing the coefficients in
    /// column `j` of `h`. Returns ‖w‖ after orthogonalization.
    fn orthogonalize(
        ip: &dyn InnerProduct,
        basis: &[Vec<f64>],
        w: &mut [f64],
        h: &mut [Vec<f64>],
        j: usize,
    ) -> f64 {
        for row in h.iter_mut().take(j + 1) {
            row[j] = 0.0;
        }
        for _ in 0..2 {
            for (i, vi) in basis.iter().enumerate() {
                let hij = ip.dot(w, vi);
                h[i][j] += hij;
                for (wk, vik) in w.iter_mut().zip(vi) {
                    *wk -= hij * vik;
                }
            }
        }
        ip.norm(w)
    }

    /// Apply the previous Givens rotations to column `j` of `h`, compute the
    /// new one and update g.
    fn apply_givens_and_update_g(
        h: &mut [Vec<f64>],
        g: &mut [f64],
        cs: &mut [f64],
        sn: &mut [f64],
        j: usize,
    ) {
        for i in 0..j {
            let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
            h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
            h[i][j] = temp;
        }
        let h_kk = h[j][j];
        let h_k1k = h[j + 1][j];
        let r = h_kk.hypot(h_k1k);
        if r == 0.0 {
            cs[j] = 1.0;
            sn[j] = 0.0;
        } else {
            cs[j] = h_kk / r;
            sn[j] = h_k1k / r;
        }
        h[j][j] = cs[j] * h_kk + sn[j] * h_k1k;
        h[j + 1][j] = 0.0;
        let temp = cs[j] * g[j] + sn[j] * g[j + 1];
        g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
        g[j] = temp;
    }

    /// Solve the upper-triangular system H y = g, skipping zero pivots.
    fn back_substitution(h: &[Vec<f64>], g: &[f64], m: usize) -> Vec<f64> {
        let mut y = vec![0.0; m];
        for i in (0..m).rev() {
            let mut yi = g[i];
            for j in (i + 1)..m {
                yi -= h[i][j] * y[j];
            }
            y[i] = if h[i][i] != 0.0 { yi / h[i][i] } else { 0.0 };
        }
        y
    }
}

impl LinearSolver for GmresSolver {
    fn solve(
        &mut self,
        a: &dyn MatVec,
        pc: Option<&dyn Preconditioner>,
        ip: &dyn InnerProduct,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<SolveStats<f64>> {
        let n = b.len();
        let b_norm = ip.norm(b);
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(SolveStats::new(0, 0.0, ConvergedReason::ConvergedAtol));
        }

        let mut r = vec![0.0; n];
        residual(a, b, x, &mut r);
        let mut beta = ip.norm(&r);
        let mut iteration = 0;
        let mut reason = self.conv.check(beta, b_norm, iteration);
        let m_max = self.restart;

        while reason == ConvergedReason::Iterating {
            let mut v_basis: Vec<Vec<f64>> = Vec::with_capacity(m_max + 1);
            let mut z_basis: Vec<Vec<f64>> = Vec::with_capacity(m_max);
            v_basis.push(r.iter().map(|&ri| ri / beta).collect());
            let mut h = vec![vec![0.0; m_max]; m_max + 1];
            let mut g = vec![0.0; m_max + 1];
            g[0] = beta;
            let mut cs = vec![0.0; m_max];
            let mut sn = vec![0.0; m_max];
            let mut m = 0;

            for j in 0..m_max {
                iteration += 1;
                let mut z = vec![0.0; n];
                precondition(pc, &v_basis[j], &mut z)?;
                let mut w = vec![0.0; n];
                a.matvec(&z, &mut w);
                z_basis.push(z);

                let h_next = Self::orthogonalize(ip, &v_basis, &mut w, &mut h, j);
                h[j + 1][j] = h_next;
                Self::apply_givens_and_update_g(&mut h, &mut g, &mut cs, &mut sn, j);
                m = j + 1;

                let res_norm = g[j + 1].abs();
                log::trace!("gmres iteration {iteration}: residual estimate {res_norm:.6e}");
                reason = self.conv.check(res_norm, b_norm, iteration);
                if reason == ConvergedReason::Iterating && h_next <= HAPPY_BREAKDOWN_TOL * beta {
                    reason = ConvergedReason::ConvergedHappyBreakdown;
                }
                if reason != ConvergedReason::Iterating {
                    break;
                }
                v_basis.push(w.iter().map(|&wi| wi / h_next).collect());
            }

            let y = Self::back_substitution(&h, &g, m);
            let finite_update = y.iter().chain(z_basis.iter().flatten()).all(|v| v.is_finite());
            if reason == ConvergedReason::DivergedNanOrInf || !finite_update {
                // keep the iterate from the start of this cycle; beta is its residual
                reason = ConvergedReason::DivergedNanOrInf;
                break;
            }
            for (yj, zj) in y.iter().zip(&z_basis) {
                for (xi, zji) in x.iter_mut().zip(zj) {
                    *xi += yj * zji;
                }
            }
            residual(a, b, x, &mut r);
            beta = ip.norm(&r);
            if reason == ConvergedReason::Iterating {
                // restart from the true residual
                reason = self.conv.check(beta, b_norm, iteration);
            } else if !beta.is_finite() {
                reason = ConvergedReason::DivergedNanOrInf;
            }
        }

        log::debug!("gmres finished after {iteration} iterations: {reason:?}, residual {beta:.6e}");
        Ok(SolveStats::new(iteration, beta, reason))
    }

    fn name(&self) -> &'static str {
        "gmres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DistributedInnerProduct;
    use crate::matrix::CsrMatrix;
    use crate::parallel::SerialComm;
    use crate::preconditioner::Jacobi;
    use approx::assert_relative_eq;

    const SERIAL: SerialComm = SerialComm;

    fn ip() -> DistributedInnerProduct<'static> {
        DistributedInnerProduct::new(&SERIAL)
    }

    fn nonsym() -> CsrMatrix {
        CsrMatrix::from_triplets(
            4,
            4,
            &[
                (0, 0, 4.0),
                (0, 1, 1.0),
                (1, 0, 2.0),
                (1, 1, 3.0),
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 2, 2.0),
                (2, 3, 1.0),
                (3, 2, 0.5),
                (3, 3, 3.0),
            ],
        )
    }

    #[test]
    fn gmres_solves_well_conditioned_nonsym() {
        let a = nonsym();
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let mut b = vec![0.0; 4];
        a.matvec(&x_true, &mut b);
        let mut x = vec![0.0; 4];
        let mut solver = GmresSolver::new(4, 1e-12, 100);
        let stats = solver.solve(&a, None, &ip(), &b, &mut x).unwrap();
        assert!(stats.converged, "{stats:?}");
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-9);
        }
    }

    #[test]
    fn restarts_and_right_preconditioning_reach_tolerance() {
        let a = nonsym();
        let b = vec![1.0, -2.0, 0.5, 3.0];
        let mut jacobi = Jacobi::new();
        crate::preconditioner::Preconditioner::setup(&mut jacobi, &a).unwrap();
        let mut x = vec![0.0; 4];
        let mut solver = GmresSolver::new(2, 1e-10, 200);
        let stats = solver.solve(&a, Some(&jacobi), &ip(), &b, &mut x).unwrap();
        assert!(stats.converged, "{stats:?}");
        let mut r = vec![0.0; 4];
        residual(&a, &b, &x, &mut r);
        let rn = r.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!(rn <= 1e-10 * ip().norm(&b) * 1.01);
        assert!((stats.final_residual - rn).abs() < 1e-14);
    }

    #[test]
    fn zero_rhs_gives_zero_solution() {
        let a = nonsym();
        let mut x = vec![1.0; 4];
        let stats = GmresSolver::new(30, 1e-8, 10)
            .solve(&a, None, &ip(), &[0.0; 4], &mut x)
            .unwrap();
        assert_eq!(x, vec![0.0; 4]);
        assert_eq!(stats.reason, ConvergedReason::ConvergedAtol);
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn zero_iteration_budget_keeps_the_guess() {
        let a = nonsym();
        let mut x = vec![0.5; 4];
        let stats = GmresSolver::new(30, 1e-8, 0)
            .solve(&a, None, &ip(), &[1.0; 4], &mut x)
            .unwrap();
        assert_eq!(x, vec![0.5; 4]);
        assert_eq!(stats.reason, ConvergedReason::DivergedIts);
        assert!(!stats.converged);
    }

    struct Poisoned;

    impl Preconditioner for Poisoned {
        fn apply(&self, _r: &[f64], z: &mut [f64]) -> Result<()> {
            z.fill(f64::NAN);
            Ok(())
        }
    }

    #[test]
    fn non_finite_krylov_update_is_discarded() {
        let a = nonsym();
        let mut x = vec![0.5; 4];
        let stats = GmresSolver::new(30, 1e-8, 100)
            .solve(&a, Some(&Poisoned), &ip(), &[1.0, 2.0, 3.0, 4.0], &mut x)
            .unwrap();
        assert_eq!(stats.reason, ConvergedReason::DivergedNanOrInf);
        assert!(!stats.converged);
        assert!(stats.final_residual.is_finite());
        assert_eq!(x, vec![0.5; 4]);
    }

    #[test]
    fn exact_solution_after_n_steps_is_a_happy_breakdown_or_rtol() {
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 2.0), (1, 1, 3.0)]);
        let mut x = vec![0.0; 2];
        let stats = GmresSolver::new(30, 1e-15, 50)
            .solve(&a, None, &ip(), &[2.0, 3.0], &mut x)
            .unwrap();
        assert!(stats.converged);
        assert!(stats.iterations <= 2);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-14);
    }
}
