use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid environment index location '{location}': {source}")]
    InvalidIndexLocation {
        location: String,
        source: url::ParseError,
    },
    #[error("runtime bootstrap failed: {0:#}")]
    Bootstrap(anyhow::Error),
    #[error("environment not initialized")]
    NotInitialized,
    #[error("{0:#}")]
    Build(anyhow::Error),
}
