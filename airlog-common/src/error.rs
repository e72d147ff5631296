use thiserror::Error;

/// Common error type for airlog components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Parse(#[from] json5::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using airlog's Error.
pub type Result<T> = std::result::Result<T, Error>;
