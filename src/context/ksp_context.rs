//! Linear solver engine: operator, Krylov backend and preconditioner.
//!
//! `KspContext` owns the assembled [`StencilOperator`], a backend selected by
//! [`SolverKind`] and, for the iterative backends, a preconditioner built on
//! the local operator block. It also owns the distributed right-hand-side and
//! solution vectors, which are overwritten (never accumulated) at the start of
//! every solve.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems. SIAM.
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

use crate::config::{Settings, SolverKind};
use crate::core::DistributedInnerProduct;
use crate::error::{Result, StreamError};
use crate::matrix::StencilOperator;
use crate::preconditioner::{self, Preconditioner};
use crate::solver::{BiCgStabSolver, GmresSolver, LinearSolver, LuSolver};
use crate::utils::convergence::SolveStats;

/// Context and configuration for the distributed solve.
pub struct KspContext {
    /// The backend selected at construction
    pub kind: SolverKind,
    operator: StencilOperator,
    solver: Box<dyn LinearSolver>,
    pc: Option<Box<dyn Preconditioner>>,
    rhs: Vec<f64>,
    x: Vec<f64>,
}

impl KspContext {
    /// Set up the backend and preconditioner for `operator`.
    ///
    /// The direct backend factors a dense copy of the operator and is refused
    /// on more than one process.
    pub fn new(operator: StencilOperator, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let rtol = settings.congr_epsilon;
        let max_it = settings.congr_max_iterations;
        let solver: Box<dyn LinearSolver> = match settings.solver {
            SolverKind::Gmres => Box::new(GmresSolver::new(settings.restart, rtol, max_it)),
            SolverKind::BiCgStab => Box::new(BiCgStabSolver::new(rtol, max_it)),
            SolverKind::DirectLu => {
                if operator.comm().size() > 1 {
                    return Err(StreamError::Configuration(
                        "the direct LU backend runs on a single process only".into(),
                    ));
                }
                Box::new(LuSolver::new(&operator.to_dense()?)?)
            }
        };
        let pc = match settings.solver {
            SolverKind::DirectLu => None,
            _ => preconditioner::build(&settings.pc, &operator.local_block())?,
        };

        let n = operator.domain().len();
        log::debug!(
            "solver engine ready: backend {}, preconditioner {:?}, rtol {rtol:e}, max_it {max_it}, {n} local rows",
            solver.name(),
            pc.as_ref().map(|_| settings.pc.kind),
        );
        Ok(Self {
            kind: settings.solver,
            operator,
            solver,
            pc,
            rhs: vec![0.0; n],
            x: vec![0.0; n],
        })
    }

    pub fn operator(&self) -> &StencilOperator {
        &self.operator
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Solve A·x = rhs starting from `x0`; both are local vectors in
    /// x-fastest order. Collective across all processes.
    ///
    /// Fails only on a length mismatch (or a preconditioner error). Failing
    /// to converge is reported through the returned [`SolveStats`].
    pub fn solve(&mut self, rhs: &[f64], x0: &[f64]) -> Result<(Vec<f64>, SolveStats<f64>)> {
        let n = self.rhs.len();
        if rhs.len() != n || x0.len() != n {
            return Err(StreamError::Shape(format!(
                "engine expects vectors of length {n}, got rhs {} and x0 {}",
                rhs.len(),
                x0.len()
            )));
        }
        self.rhs.copy_from_slice(rhs);
        self.x.copy_from_slice(x0);
        let ip = DistributedInnerProduct::new(self.operator.comm());
        let stats = self
            .solver
            .solve(&self.operator, self.pc.as_deref(), &ip, &self.rhs, &mut self.x)?;
        Ok((self.x.clone(), stats))
    }
}
