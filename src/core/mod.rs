//! Core traits and their implementations for dense and distributed data.

pub mod traits;
pub mod wrappers;

pub use traits::{InnerProduct, MatVec};
pub use wrappers::DistributedInnerProduct;
