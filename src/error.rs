use thiserror::Error;

/// Errors that can occur when building or querying a kd-forest.
#[derive(Debug, Error)]
pub enum KdForestError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("forest has not been built yet")]
    NotBuilt,

    #[error("forest has already been built")]
    AlreadyBuilt,

    #[error("point set is empty")]
    EmptyPointSet,

    #[error("tree index out of range: {0}")]
    InvalidTreeIndex(usize),

    #[error("dimension must be greater than 0")]
    ZeroDimension,
}

/// A specialized Result type for kd-forest operations.
pub type Result<T> = std::result::Result<T, KdForestError>;
