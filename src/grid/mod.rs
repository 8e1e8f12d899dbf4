//! Grid geometry consumed by the solver: the domain decomposition, the padded
//! coefficient fields and the ghost-cell utilities.

pub mod boundaries;
pub mod partition;
pub mod state;

pub use boundaries::{enforce_boundaries, halo_exchange};
pub use partition::{BoundaryType, Decomposition, Direction, LocalDomain};
pub use state::{GridState, LevelMask};
