//! Streamfunction solver facade.
//!
//! Ties the pieces together for a host ocean model: the decomposition, the
//! assembled operator, the boundary injection and the solver engine. The host
//! passes padded local fields (two ghost layers on every side) and gets a new
//! padded field back; none of its arrays are modified.

pub mod injector;

pub use injector::inject_dirichlet;

use std::sync::Arc;

use faer::Mat;

use crate::config::Settings;
use crate::context::KspContext;
use crate::error::{Result, StreamError};
use crate::grid::{enforce_boundaries, Decomposition, GridState, LocalDomain};
use crate::matrix::{assemble_poisson_matrix, BoundaryFactors};
use crate::parallel::{Comm, ParallelContext};
use crate::utils::convergence::SolveStats;

/// Solver for the barotropic streamfunction of one process's sub-domain.
///
/// Construction assembles the operator and sets up the engine; a value of
/// this type is always ready to solve.
pub struct StreamfunctionSolver {
    domain: LocalDomain,
    enable_cyclic_x: bool,
    factors: BoundaryFactors,
    ksp: KspContext,
    comm: Arc<dyn Comm>,
}

impl StreamfunctionSolver {
    /// Assemble the operator from `state` and set up the engine.
    ///
    /// The process grid of `ctx` must match `settings.num_proc`.
    pub fn new(state: &GridState, settings: &Settings, ctx: &ParallelContext) -> Result<Self> {
        settings.validate()?;
        if ctx.num_proc != settings.num_proc {
            return Err(StreamError::Configuration(format!(
                "parallel context is {:?} but settings ask for {:?} processes",
                ctx.num_proc, settings.num_proc
            )));
        }
        let domain = Decomposition::from_settings(settings)?.local(ctx.proc_idx)?;
        let (operator, factors) = assemble_poisson_matrix(state, &domain, Arc::clone(&ctx.comm))?;
        let ksp = KspContext::new(operator, settings)?;
        log::debug!(
            "streamfunction solver on process {:?}: owns x {:?}, y {:?} of a {}x{} grid",
            domain.proc_idx,
            domain.i_range,
            domain.j_range,
            domain.nx,
            domain.ny
        );
        Ok(Self {
            domain,
            enable_cyclic_x: settings.enable_cyclic_x,
            factors,
            ksp,
            comm: Arc::clone(&ctx.comm),
        })
    }

    pub fn domain(&self) -> &LocalDomain {
        &self.domain
    }

    pub fn boundary_factors(&self) -> &BoundaryFactors {
        &self.factors
    }

    pub fn engine(&self) -> &KspContext {
        &self.ksp
    }

    /// Solve for the streamfunction. See [`solve_with_stats`](Self::solve_with_stats).
    pub fn solve(
        &mut self,
        state: &GridState,
        rhs: &Mat<f64>,
        x0: &Mat<f64>,
        boundary_val: Option<&Mat<f64>>,
    ) -> Result<Mat<f64>> {
        self.solve_with_stats(state, rhs, x0, boundary_val).map(|(x, _)| x)
    }

    /// Solve for the streamfunction and report how the iteration ended.
    ///
    /// Masked cells take their value from `boundary_val` (default: `x0` as
    /// passed in) and keep it exactly. Non-convergence is not an error: a
    /// warning is logged and the best iterate is returned. Collective.
    pub fn solve_with_stats(
        &mut self,
        state: &GridState,
        rhs: &Mat<f64>,
        x0: &Mat<f64>,
        boundary_val: Option<&Mat<f64>>,
    ) -> Result<(Mat<f64>, SolveStats<f64>)> {
        state.check_shape(&self.domain)?;
        self.check_field("rhs", rhs)?;
        self.check_field("x0", x0)?;
        if let Some(bv) = boundary_val {
            self.check_field("boundary_val", bv)?;
        }
        let (pi, pj) = self.domain.padded_shape();
        let (ni, nj) = (self.domain.ni(), self.domain.nj());

        let x0_filled = enforce_boundaries(x0, &self.domain, self.comm.as_ref());
        let boundary_val = boundary_val.unwrap_or(x0);
        let masked = Mat::from_fn(pi, pj, |i, j| {
            if state.is_active(i, j) {
                rhs[(i, j)]
            } else {
                boundary_val[(i, j)]
            }
        });
        let rhs_m = inject_dirichlet(&masked, &self.domain, &self.factors, self.enable_cyclic_x);

        let mut b = Vec::with_capacity(ni * nj);
        let mut guess = Vec::with_capacity(ni * nj);
        for j in 2..nj + 2 {
            for i in 2..ni + 2 {
                b.push(rhs_m[(i, j)]);
                guess.push(x0_filled[(i, j)]);
            }
        }
        let (x, stats) = self.ksp.solve(&b, &guess)?;
        if stats.reason.is_diverged() {
            log::warn!(
                "streamfunction solver did not converge after {} iterations (reason code {}, residual {:.3e})",
                stats.iterations,
                stats.reason.code(),
                stats.final_residual
            );
        }

        let mut out = rhs_m;
        for jl in 0..nj {
            for il in 0..ni {
                let (i, j) = (il + 2, jl + 2);
                if state.is_active(i, j) {
                    out[(i, j)] = x[self.domain.local_index(il, jl)];
                }
            }
        }
        Ok((out, stats))
    }

    fn check_field(&self, name: &str, field: &Mat<f64>) -> Result<()> {
        let expected = self.domain.padded_shape();
        if (field.nrows(), field.ncols()) != expected {
            return Err(StreamError::Shape(format!(
                "{name} is {}x{}, expected {}x{}",
                field.nrows(),
                field.ncols(),
                expected.0,
                expected.1
            )));
        }
        Ok(())
    }
}
