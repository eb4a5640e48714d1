use thiserror::Error;

/// Result type for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for media operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Ring buffer capacity must be a non-zero power of two
    #[error("Ring buffer capacity must be a power of 2, got {0}")]
    InvalidCapacity(usize),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Encoded frame exceeds the maximum packet size
    #[error("Encoded frame of {size} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { size: usize, max: usize },

    /// Audio device error
    #[error("Audio device error: {0}")]
    Device(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
