//! Message-passing abstraction for the distributed solver.
//!
//! Every process owns one rectangular sub-domain. The Krylov solve only needs
//! two collective primitives: a global sum (dot products and norms) and a
//! neighbour send/receive (halo exchange). [`SerialComm`] is always available
//! and fakes a 1×1 process grid; [`MpiComm`] is enabled by the `mpi` feature.

use std::sync::Arc;

use crate::error::{Result, StreamError};

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    /// Global sum of a scalar over all processes.
    fn all_reduce(&self, x: f64) -> f64;
    /// Send `send` to `dest` while receiving `recv` from `source`.
    ///
    /// `None` on either side means there is no partner in that direction
    /// (a ghosted domain edge). Message sizes must agree pairwise.
    fn sendrecv(
        &self,
        send: &[f64],
        dest: Option<usize>,
        recv: &mut [f64],
        source: Option<usize>,
    );
}

pub mod serial_comm;
pub use serial_comm::SerialComm;

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

/// Process-grid context handed to the solver at construction time.
#[derive(Clone)]
pub struct ParallelContext {
    pub comm: Arc<dyn Comm>,
    /// Process-grid shape (px, py)
    pub num_proc: (usize, usize),
    /// Logical coordinate of this process in the process grid
    pub proc_idx: (usize, usize),
}

impl ParallelContext {
    /// Single process owning the whole domain.
    pub fn serial() -> Self {
        Self {
            comm: Arc::new(SerialComm::new()),
            num_proc: (1, 1),
            proc_idx: (0, 0),
        }
    }

    /// Lay the communicator out as a `px × py` grid, x fastest.
    pub fn new(comm: Arc<dyn Comm>, num_proc: (usize, usize)) -> Result<Self> {
        let (px, py) = num_proc;
        if px == 0 || py == 0 || px * py != comm.size() {
            return Err(StreamError::Configuration(format!(
                "process grid {}x{} does not match communicator size {}",
                px,
                py,
                comm.size()
            )));
        }
        let rank = comm.rank();
        Ok(Self {
            comm,
            num_proc,
            proc_idx: (rank % px, rank / px),
        })
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }
}

impl std::fmt::Debug for ParallelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelContext")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("num_proc", &self.num_proc)
            .field("proc_idx", &self.proc_idx)
            .finish()
    }
}
