//! Run-time settings for the streamfunction solver.
//!
//! `Settings` carries the grid size, the process-grid shape and the Krylov
//! stopping criteria; `PcOptions` selects and tunes the preconditioner. Both
//! derive `serde` so a host model can load them alongside its own settings.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Krylov (or direct) backend used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// Restarted GMRES with right preconditioning
    Gmres,
    /// BiConjugate Gradient Stabilized
    BiCgStab,
    /// Dense LU of the whole operator (single process only)
    DirectLu,
}

/// Preconditioner family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PcKind {
    None,
    Jacobi,
    Amg,
}

/// Relaxation used as the multigrid smoother.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelaxType {
    /// Symmetric Gauss-Seidel/SOR inside the process block, Jacobi across blocks
    SorJacobi,
    /// Damped Jacobi
    Jacobi,
}

/// Preconditioner types & parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcOptions {
    /// Type of preconditioner (none, jacobi, amg)
    pub kind: PcKind,
    /// Smoother used on every multigrid level
    pub relax: RelaxType,
    /// Maximum number of multigrid levels (including the coarsest)
    pub max_levels: usize,
    /// Strength-of-connection threshold θ: |a_ij| ≥ θ·sqrt(|a_ii·a_jj|)
    pub strength_threshold: f64,
    /// Levels at or below this size are solved directly
    pub coarse_size: usize,
    /// Relaxation factor ω
    pub omega: f64,
    /// Pre- and post-smoothing sweeps
    pub sweeps: usize,
}

impl Default for PcOptions {
    fn default() -> Self {
        Self {
            kind: PcKind::Amg,
            relax: RelaxType::SorJacobi,
            max_levels: 10,
            strength_threshold: 0.25,
            coarse_size: 64,
            omega: 1.0,
            sweeps: 1,
        }
    }
}

/// Grid, decomposition and solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Global number of grid cells along x (without ghost cells)
    pub nx: usize,
    /// Global number of grid cells along y (without ghost cells)
    pub ny: usize,
    /// Process-grid shape (px, py)
    pub num_proc: (usize, usize),
    /// Periodic boundary along x
    pub enable_cyclic_x: bool,
    /// Relative tolerance of the Krylov iteration
    pub congr_epsilon: f64,
    /// Iteration cap of the Krylov iteration
    pub congr_max_iterations: usize,
    pub solver: SolverKind,
    /// Krylov subspace size before a GMRES restart
    pub restart: usize,
    pub pc: PcOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nx: 0,
            ny: 0,
            num_proc: (1, 1),
            enable_cyclic_x: false,
            congr_epsilon: 1e-12,
            congr_max_iterations: 1000,
            solver: SolverKind::Gmres,
            restart: 30,
            pc: PcOptions::default(),
        }
    }
}

impl Settings {
    /// Settings for an `nx` × `ny` grid on a single process.
    pub fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny, ..Default::default() }
    }

    pub fn with_num_proc(mut self, px: usize, py: usize) -> Self {
        self.num_proc = (px, py);
        self
    }

    pub fn with_cyclic_x(mut self, cyclic: bool) -> Self {
        self.enable_cyclic_x = cyclic;
        self
    }

    pub fn with_tolerance(mut self, congr_epsilon: f64, congr_max_iterations: usize) -> Self {
        self.congr_epsilon = congr_epsilon;
        self.congr_max_iterations = congr_max_iterations;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_pc(mut self, pc: PcOptions) -> Self {
        self.pc = pc;
        self
    }

    /// Reject settings no solver can be built from.
    ///
    /// Divisibility of the grid by the process grid is checked by
    /// [`Decomposition::new`](crate::grid::Decomposition::new).
    pub fn validate(&self) -> Result<()> {
        if !(self.congr_epsilon.is_finite() && self.congr_epsilon >= 0.0) {
            return Err(StreamError::Configuration(format!(
                "congr_epsilon must be finite and non-negative, got {}",
                self.congr_epsilon
            )));
        }
        if self.solver == SolverKind::Gmres && self.restart == 0 {
            return Err(StreamError::Configuration("GMRES restart must be at least 1".into()));
        }
        if self.pc.kind == PcKind::Amg {
            if self.pc.max_levels == 0 {
                return Err(StreamError::Configuration("AMG needs at least one level".into()));
            }
            if !(self.pc.omega > 0.0 && self.pc.omega < 2.0) {
                return Err(StreamError::Configuration(format!(
                    "relaxation factor must lie in (0, 2), got {}",
                    self.pc.omega
                )));
            }
        }
        Ok(())
    }
}
