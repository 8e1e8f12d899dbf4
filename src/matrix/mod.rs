//! Matrix module: CSR storage and the assembled streamfunction operator.

pub mod sparse;
pub use sparse::{CsrMatrix, SparseMatrix};
pub mod stencil;
pub use stencil::{assemble_poisson_matrix, BoundaryFactors, StencilOperator};
