use thiserror::Error;

/// Common error type for the Copilot metrics crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
