//! Call configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use voxcall_media_core::frame_size;
use voxcall_rtp_core::SrtpCryptoSuite;

use crate::errors::{Result, SessionError};

/// Longest accepted identity or credential field
pub const MAX_IDENTITY_LEN: usize = 255;

/// Default SRTP suite
pub const DEFAULT_CRYPTO_SUITE: &str = "AES_CM_128_HMAC_SHA1_80";

/// Everything a [`CallSession`](crate::CallSession) needs to know before it
/// places or accepts a call.
///
/// Every field has a default, so a TOML file only needs the identity:
///
/// ```toml
/// local_uri = "sip:alice@example.com"
/// username = "alice"
/// password = "secret"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    pub local_uri: String,
    pub display_name: String,
    pub username: String,
    pub password: String,
    pub registrar: String,

    /// SRTP suite offered and accepted. `None` sends plain RTP.
    pub crypto_suite: Option<String>,

    pub sample_rate: u32,
    pub channels: u8,
    pub frame_ms: u32,
    /// Ring buffer capacity in samples. 0 derives it from the frame size.
    pub ring_capacity: usize,
    /// Payload type sent by the side that placed the call
    pub payload_type_initiator: u8,
    /// Payload type sent by the side that accepted the call
    pub payload_type_acceptor: u8,
    pub replay_window: u64,

    /// Send loop backoff while waiting for a captured frame
    pub capture_poll_ms: u64,
    /// `block_on_call` polling interval
    pub block_poll_ms: u64,
    pub monitor_interval_ms: u64,
    /// Consecutive silent monitor intervals before the peer is declared gone
    pub stasis_threshold: u32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            local_uri: String::new(),
            display_name: String::new(),
            username: String::new(),
            password: String::new(),
            registrar: String::new(),
            crypto_suite: Some(DEFAULT_CRYPTO_SUITE.to_string()),
            sample_rate: 48000,
            channels: 1,
            frame_ms: 20,
            ring_capacity: 0,
            payload_type_initiator: 116,
            payload_type_acceptor: 102,
            replay_window: 64,
            capture_poll_ms: 5,
            block_poll_ms: 50,
            monitor_interval_ms: 1000,
            stasis_threshold: 3,
        }
    }
}

impl CallConfig {
    pub fn new(local_uri: impl Into<String>) -> Self {
        Self {
            local_uri: local_uri.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_crypto_suite(mut self, suite: Option<&str>) -> Self {
        self.crypto_suite = suite.map(str::to_string);
        self
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = voxcall_infra_common::parse_toml(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = voxcall_infra_common::load_toml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured SRTP suite, if any
    pub fn srtp_suite(&self) -> Result<Option<SrtpCryptoSuite>> {
        match &self.crypto_suite {
            None => Ok(None),
            Some(name) => SrtpCryptoSuite::from_name(name)
                .map(Some)
                .ok_or_else(|| SessionError::config(format!("unsupported crypto suite {}", name))),
        }
    }

    /// Samples per frame at the configured rate
    pub fn frame_samples(&self) -> usize {
        frame_size(self.sample_rate, self.frame_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("local_uri", &self.local_uri),
            ("display_name", &self.display_name),
            ("username", &self.username),
            ("password", &self.password),
            ("registrar", &self.registrar),
        ] {
            if value.len() > MAX_IDENTITY_LEN {
                return Err(SessionError::InvalidArgument(format!(
                    "{} is {} bytes, limit is {}",
                    field,
                    value.len(),
                    MAX_IDENTITY_LEN
                )));
            }
        }

        self.srtp_suite()?;

        if self.sample_rate == 0 || self.frame_ms == 0 || self.channels == 0 {
            return Err(SessionError::config("sample rate, channels and frame duration must be non-zero"));
        }
        if self.ring_capacity != 0 && !self.ring_capacity.is_power_of_two() {
            return Err(SessionError::config(format!(
                "ring capacity {} is not a power of two",
                self.ring_capacity
            )));
        }
        if self.payload_type_initiator > 127 || self.payload_type_acceptor > 127 {
            return Err(SessionError::config("payload types must be below 128"));
        }
        if self.capture_poll_ms == 0 || self.block_poll_ms == 0 || self.monitor_interval_ms == 0 {
            return Err(SessionError::config("polling intervals must be non-zero"));
        }
        if self.stasis_threshold == 0 {
            return Err(SessionError::config("stasis threshold must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CallConfig::default();
        assert_eq!(config.frame_samples(), 960);
        assert_eq!(config.srtp_suite().unwrap().unwrap().tag_length, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = CallConfig::from_toml(
            r#"
            local_uri = "sip:alice@example.com"
            username = "alice"
            password = "secret"
            monitor_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.username, "alice");
        assert_eq!(config.monitor_interval_ms, 250);
        assert_eq!(config.payload_type_initiator, 116);
        assert_eq!(config.crypto_suite.as_deref(), Some(DEFAULT_CRYPTO_SUITE));
    }

    #[test]
    fn test_overlong_identity_is_rejected() {
        let config = CallConfig::new("x".repeat(MAX_IDENTITY_LEN + 1));
        assert!(matches!(config.validate(), Err(SessionError::InvalidArgument(_))));
        assert!(CallConfig::new("x".repeat(MAX_IDENTITY_LEN)).validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let unknown_suite = CallConfig::default().with_crypto_suite(Some("NULL_CIPHER"));
        assert!(matches!(unknown_suite.validate(), Err(SessionError::Config(_))));

        let plain = CallConfig::default().with_crypto_suite(None);
        assert!(plain.validate().is_ok());

        let bad_ring = CallConfig { ring_capacity: 1000, ..Default::default() };
        assert!(bad_ring.validate().is_err());

        let bad_pt = CallConfig { payload_type_acceptor: 200, ..Default::default() };
        assert!(bad_pt.validate().is_err());

        assert!(CallConfig::from_toml("sample_rate = 0").is_err());
    }
}
