//! MPI-based parallel communication module.
//!
//! This module implements the `Comm` trait on top of rsmpi for
//! distributed-memory runs: global sums for the Krylov inner products, and
//! neighbour send/receive for the halo exchange of the stencil operator.
//! It is only compiled with the `mpi` feature.
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")]
//! # {
//! use std::sync::Arc;
//! use streamsolve::parallel::{MpiComm, ParallelContext};
//! let comm = MpiComm::new().expect("MPI already initialised");
//! let ctx = ParallelContext::new(Arc::new(comm), (2, 2)).unwrap();
//! # }
//! ```

use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::{Result, StreamError};

/// MPI communicator wrapper for distributed parallelism.
pub struct MpiComm {
    /// Keeps MPI initialised for as long as the communicator lives.
    _universe: Option<Universe>,
    /// The communicator all solver processes belong to.
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    /// Initializes MPI and wraps the world communicator.
    ///
    /// Fails if MPI has already been initialised by the host; use
    /// [`MpiComm::from_world`] in that case.
    pub fn new() -> Result<Self> {
        let universe = mpi::initialize()
            .ok_or_else(|| StreamError::Configuration("MPI is already initialized".into()))?;
        let world = universe.world();
        let mut comm = Self::from_world(world);
        comm._universe = Some(universe);
        Ok(comm)
    }

    /// Wrap a communicator owned by the host model.
    pub fn from_world(world: SimpleCommunicator) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { _universe: None, world, rank, size }
    }
}

impl super::Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize {
        self.rank
    }

    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize {
        self.size
    }

    /// Performs an all-reduce sum operation across all processes.
    fn all_reduce(&self, x: f64) -> f64 {
        use mpi::collective::SystemOperation;
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }

    /// Posts the send without blocking, then receives, then completes the send.
    ///
    /// With `dest == source == self.rank` (periodic axis on one process
    /// column) MPI matches the message to ourselves.
    fn sendrecv(
        &self,
        send: &[f64],
        dest: Option<usize>,
        recv: &mut [f64],
        source: Option<usize>,
    ) {
        mpi::request::scope(|scope| {
            let request = dest.map(|d| {
                self.world
                    .process_at_rank(d as i32)
                    .immediate_send(scope, send)
            });
            if let Some(s) = source {
                self.world.process_at_rank(s as i32).receive_into(recv);
            }
            if let Some(request) = request {
                request.wait();
            }
        });
    }
}
