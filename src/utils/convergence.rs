//! Convergence tracking & tolerance checks for iterative solvers.

use num_traits::Float;

/// Why an iteration stopped. Codes follow PETSc's `KSPConvergedReason`:
/// positive means converged, negative means diverged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergedReason {
    /// Still iterating
    Iterating,
    /// ‖r‖ ≤ rtol·‖b‖
    ConvergedRtol,
    /// ‖r‖ ≤ atol, also reported for a zero right-hand side
    ConvergedAtol,
    /// The Krylov space became invariant; the iterate is exact
    ConvergedHappyBreakdown,
    /// Iteration cap reached
    DivergedIts,
    /// A scalar recurrence broke down
    DivergedBreakdown,
    /// A residual norm was NaN or infinite
    DivergedNanOrInf,
}

impl ConvergedReason {
    pub fn code(self) -> i32 {
        match self {
            ConvergedReason::Iterating => 0,
            ConvergedReason::ConvergedRtol => 2,
            ConvergedReason::ConvergedAtol => 3,
            ConvergedReason::ConvergedHappyBreakdown => 5,
            ConvergedReason::DivergedIts => -3,
            ConvergedReason::DivergedBreakdown => -5,
            ConvergedReason::DivergedNanOrInf => -9,
        }
    }

    pub fn is_converged(self) -> bool {
        self.code() > 0
    }

    pub fn is_diverged(self) -> bool {
        self.code() < 0
    }
}

/// Stopping criteria: relative tolerance against ‖b‖, absolute tolerance, iteration cap.
#[derive(Clone, Copy, Debug)]
pub struct Convergence<T> {
    pub rtol: T,
    pub atol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
    pub reason: ConvergedReason,
}

impl<T: Float> SolveStats<T> {
    pub fn new(iterations: usize, final_residual: T, reason: ConvergedReason) -> Self {
        Self {
            iterations,
            final_residual,
            converged: reason.is_converged(),
            reason,
        }
    }
}

impl<T: Copy + Float> Convergence<T> {
    pub fn new(rtol: T, max_iters: usize) -> Self {
        Self { rtol, atol: T::zero(), max_iters }
    }

    /// Classify iteration `i` with residual `res_norm`; `Iterating` means keep going.
    pub fn check(&self, res_norm: T, b_norm: T, i: usize) -> ConvergedReason {
        if !res_norm.is_finite() {
            ConvergedReason::DivergedNanOrInf
        } else if res_norm <= self.rtol * b_norm {
            ConvergedReason::ConvergedRtol
        } else if res_norm <= self.atol {
            ConvergedReason::ConvergedAtol
        } else if i >= self.max_iters {
            ConvergedReason::DivergedIts
        } else {
            ConvergedReason::Iterating
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_classifies_residuals() {
        let conv = Convergence::new(1e-6, 10);
        assert_eq!(conv.check(1e-7, 1.0, 3), ConvergedReason::ConvergedRtol);
        assert_eq!(conv.check(1e-3, 1.0, 3), ConvergedReason::Iterating);
        assert_eq!(conv.check(1e-3, 1.0, 10), ConvergedReason::DivergedIts);
        assert_eq!(conv.check(f64::NAN, 1.0, 1), ConvergedReason::DivergedNanOrInf);
    }

    #[test]
    fn zero_budget_diverges_on_nonzero_residual() {
        let conv = Convergence::new(1e-12, 0);
        let reason = conv.check(2.0, 2.0, 0);
        assert_eq!(reason, ConvergedReason::DivergedIts);
        assert!(reason.code() < 0);
    }
}
