use thiserror::Error;

pub type RecsResult<T> = Result<T, RecsError>;

#[derive(Error, Debug)]
pub enum RecsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Version registry error: {0}")]
    Registry(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Hybrid precondition failed: {0}")]
    HybridPrecondition(String),

    #[error("Parallel similarity path failed: {0}")]
    Parallel(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
