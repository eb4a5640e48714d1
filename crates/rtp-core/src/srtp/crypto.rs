use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;

use super::SrtpCryptoSuite;
use crate::error::Error;
use crate::Result;

/// SRTP master key and salt
#[derive(Clone, PartialEq, Eq)]
pub struct SrtpCryptoKey {
    key: Vec<u8>,
    salt: Vec<u8>,
}

impl SrtpCryptoKey {
    pub fn new(key: Vec<u8>, salt: Vec<u8>) -> Self {
        Self { key, salt }
    }

    /// Generate fresh random key material sized for `suite`
    pub fn random(suite: &SrtpCryptoSuite) -> Self {
        let mut rng = rand::thread_rng();
        let mut key = vec![0u8; suite.key_length];
        let mut salt = vec![0u8; suite.salt_length];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut salt);
        Self { key, salt }
    }

    /// Decode the base64 `key||salt` form used in SDES `inline:` key params.
    ///
    /// The decoded length must equal the suite's key plus salt length.
    pub fn from_base64(suite: &SrtpCryptoSuite, encoded: &str) -> Result<Self> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::ParseError(format!("Invalid base64 key material: {}", e)))?;

        if raw.len() != suite.master_length() {
            return Err(Error::SrtpError(format!(
                "Key material for {} must be {} bytes, got {}",
                suite.name,
                suite.master_length(),
                raw.len()
            )));
        }

        let (key, salt) = raw.split_at(suite.key_length);
        Ok(Self::new(key.to_vec(), salt.to_vec()))
    }

    /// Encode as base64 `key||salt`
    pub fn to_base64(&self) -> String {
        let mut raw = Vec::with_capacity(self.key.len() + self.salt.len());
        raw.extend_from_slice(&self.key);
        raw.extend_from_slice(&self.salt);
        STANDARD.encode(raw)
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Check the key and salt lengths against `suite`
    pub fn validate(&self, suite: &SrtpCryptoSuite) -> Result<()> {
        if self.key.len() != suite.key_length || self.salt.len() != suite.salt_length {
            return Err(Error::SrtpError(format!(
                "{} requires a {}-byte key and {}-byte salt, got {} and {}",
                suite.name,
                suite.key_length,
                suite.salt_length,
                self.key.len(),
                self.salt.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SrtpCryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrtpCryptoKey")
            .field("key", &"[REDACTED]")
            .field("salt", &"[REDACTED]")
            .finish()
    }
}
