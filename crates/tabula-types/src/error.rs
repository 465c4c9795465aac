use thiserror::Error;

/// Errors returned by every table manager operation.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("table '{0}' not found")]
    NotFound(String),

    #[error("table '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("configuration error: {0}")]
    Config(String),
}
