use thiserror::Error;

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem or socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// A value failed validation
    #[error("Validation error: {0}")]
    Validation(String),
}
