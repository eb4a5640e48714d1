//! Error types for the call session engine

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Offer/answer negotiation failures.
///
/// These fail the exchange in progress and are reported to the signaling
/// collaborator as a rejection. They never tear the session down by
/// themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// The remote description offers no codec we support
    #[error("No common audio format")]
    NoCommonFormat,

    /// The description could not be parsed
    #[error("Malformed session description: {0}")]
    Malformed(String),

    /// An answer arrived without an outstanding offer
    #[error("Answer received without an outstanding offer")]
    UnexpectedAnswer,

    /// No usable audio stream or media address
    #[error("No usable audio media in session description")]
    MissingMedia,
}

/// Errors surfaced by the call session engine
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// `start` while the previous call is still tearing down
    #[error("Call teardown in progress")]
    TeardownInProgress,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("RTP error: {0}")]
    Rtp(#[from] voxcall_rtp_core::Error),

    #[error("Media error: {0}")]
    Media(#[from] voxcall_media_core::Error),

    #[error("Signaling error: {0}")]
    Signaling(String),

    /// The registry is full
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn signaling(message: impl Into<String>) -> Self {
        Self::Signaling(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<voxcall_infra_common::Error> for SessionError {
    fn from(err: voxcall_infra_common::Error) -> Self {
        match err {
            voxcall_infra_common::Error::Io(e) => SessionError::Io(e),
            other => SessionError::Config(other.to_string()),
        }
    }
}
