//! BiCGStab solver (Saad §7.4.2), right-preconditioned.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::Result;
use crate::preconditioner::Preconditioner;
use crate::solver::{precondition, residual, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};

#[derive(Clone, Debug)]
pub struct BiCgStabSolver {
    pub conv: Convergence<f64>,
}

impl BiCgStabSolver {
    pub fn new(rtol: f64, max_iters: usize) -> Self {
        Self { conv: Convergence::new(rtol, max_iters) }
    }
}

fn axpy(y: &mut [f64], alpha: f64, x: &[f64]) {
    y.iter_mut().zip(x).for_each(|(yi, xi)| *yi += alpha * xi);
}

fn all_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}

impl LinearSolver for BiCgStabSolver {
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
        // r0 = b - A x0
        let mut r = vec![0.0; n];
        residual(a, b, x, &mut r);
        let mut r_norm = ip.norm(&r);
        let reason = self.conv.check(r_norm, b_norm, 0);
        if reason != ConvergedReason::Iterating {
            return Ok(SolveStats::new(0, r_norm, reason));
        }

        let r_hat = r.clone(); // shadow residual
        let mut rho_prev = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut p = vec![0.0; n];
        let mut v = vec![0.0; n];
        let mut p_hat = vec![0.0; n];
        let mut s = vec![0.0; n];
        let mut s_hat = vec![0.0; n];
        let mut t = vec![0.0; n];

        for i in 1..=self.conv.max_iters {
            let rho = ip.dot(&r_hat, &r);
            if rho == 0.0 {
                return Ok(SolveStats::new(i - 1, r_norm, ConvergedReason::DivergedBreakdown));
            }
            let beta = (rho / rho_prev) * (alpha / omega);
            // p = r + beta * (p - omega * v)
            for ((pj, rj), vj) in p.iter_mut().zip(&r).zip(&v) {
                *pj = rj + beta * (*pj - omega * vj);
            }
            precondition(pc, &p, &mut p_hat)?;
            a.matvec(&p_hat, &mut v);
            let alpha_den = ip.dot(&r_hat, &v);
            if alpha_den == 0.0 {
                return Ok(SolveStats::new(i - 1, r_norm, ConvergedReason::DivergedBreakdown));
            }
            alpha = rho / alpha_den;
            // s = r - alpha * v
            for ((sj, rj), vj) in s.iter_mut().zip(&r).zip(&v) {
                *sj = rj - alpha * vj;
            }
            let s_norm = ip.norm(&s);
            let half = self.conv.check(s_norm, b_norm, 0);
            if half == ConvergedReason::DivergedNanOrInf {
                // x still holds the last finite iterate
                return Ok(SolveStats::new(i - 1, r_norm, half));
            }
            if half.is_converged() {
                axpy(x, alpha, &p_hat);
                log::trace!("bicgstab iteration {i}: residual {s_norm:.6e}");
                return Ok(SolveStats::new(i, s_norm, half));
            }
            precondition(pc, &s, &mut s_hat)?;
            a.matvec(&s_hat, &mut t);
            let tt = ip.dot(&t, &t);
            if tt == 0.0 {
                axpy(x, alpha, &p_hat);
                return Ok(SolveStats::new(i, s_norm, ConvergedReason::DivergedBreakdown));
            }
            omega = ip.dot(&t, &s) / tt;
            if !(omega.is_finite() && all_finite(&s_hat)) {
                return Ok(SolveStats::new(i - 1, r_norm, ConvergedReason::DivergedNanOrInf));
            }
            // x = x + alpha * p_hat + omega * s_hat
            axpy(x, alpha, &p_hat);
            axpy(x, omega, &s_hat);
            // r = s - omega * t
            for ((rj, sj), tj) in r.iter_mut().zip(&s).zip(&t) {
                *rj = sj - omega * tj;
            }
            r_norm = ip.norm(&r);
            log::trace!("bicgstab iteration {i}: residual {r_norm:.6e}");
            let reason = self.conv.check(r_norm, b_norm, i);
            if reason != ConvergedReason::Iterating {
                return Ok(SolveStats::new(i, r_norm, reason));
            }
            if omega == 0.0 {
                return Ok(SolveStats::new(i, r_norm, ConvergedReason::DivergedBreakdown));
            }
            rho_prev = rho;
        }
        // unreachable for max_iters > 0: the last check reports DivergedIts
        Ok(SolveStats::new(self.conv.max_iters, r_norm, ConvergedReason::DivergedIts))
    }

    fn name(&self) -> &'static str {
        "bicgstab"
    }
}
