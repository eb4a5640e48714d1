//! Security mechanisms for RTP
//!
//! - SDES (Security DEScriptions): Method for exchanging SRTP keys via SDP

pub mod sdes;

pub use sdes::SdesCryptoAttribute;
