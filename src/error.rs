use thiserror::Error;

// Unified error type for streamsolve

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("non-finite value in `{field}` at ({i}, {j})")]
    NonFinite {
        field: &'static str,
        i: usize,
        j: usize,
    },
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("factorization error: {0}")]
    Factor(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, StreamError>;
