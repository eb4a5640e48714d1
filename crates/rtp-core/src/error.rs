use std::io;
use thiserror::Error;

/// Error type for RTP operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Error when encoding RTP packet
    #[error("Failed to encode RTP packet: {0}")]
    EncodeError(String),

    /// Error when decoding RTP packet
    #[error("Failed to decode RTP packet: {0}")]
    DecodeError(String),

    /// Invalid packet format
    #[error("Invalid RTP packet format: {0}")]
    InvalidPacket(String),

    /// Buffer too small
    #[error("Buffer too small for RTP packet: need {required} but have {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// Invalid parameter for RTP operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error when sending/receiving RTP packets
    #[error("IO error: {0}")]
    IoError(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// SRTP error
    #[error("SRTP error: {0}")]
    SrtpError(String),

    /// SRTP authentication tag did not verify
    #[error("SRTP authentication failed")]
    AuthenticationFailed,

    /// SRTP packet index already seen or too old for the replay window
    #[error("SRTP replay detected for packet index {0}")]
    ReplayDetected(u64),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}
