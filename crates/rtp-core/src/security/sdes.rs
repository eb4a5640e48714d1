//! SDES crypto attributes (RFC 4568)
//!
//! `a=crypto:<tag> <crypto-suite> <key-method>:<key-info> [<session-params>]`

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::srtp::{SrtpCryptoKey, SrtpCryptoSuite};
use crate::Result;

/// Parsed `a=crypto` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesCryptoAttribute {
    pub tag: u32,
    pub crypto_suite: String,
    pub key_method: String,
    /// Key params after the method, including any `|lifetime|MKI` suffix
    pub key_info: String,
    pub session_params: Vec<String>,
}

impl SdesCryptoAttribute {
    /// Build an `inline` attribute for `key`
    pub fn new(tag: u32, suite: &SrtpCryptoSuite, key: &SrtpCryptoKey) -> Self {
        Self {
            tag,
            crypto_suite: suite.name.to_string(),
            key_method: "inline".to_string(),
            key_info: key.to_base64(),
            session_params: Vec::new(),
        }
    }

    /// Parse the attribute value, with or without the `a=crypto:` prefix
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix("a=crypto:")
            .or_else(|| s.strip_prefix("crypto:"))
            .unwrap_or(s);

        let mut parts = s.split_whitespace();

        let tag = parts
            .next()
            .ok_or_else(|| Error::ParseError("Missing crypto tag".to_string()))?
            .parse::<u32>()
            .map_err(|e| Error::ParseError(format!("Invalid crypto tag: {}", e)))?;

        let crypto_suite = parts
            .next()
            .ok_or_else(|| Error::ParseError("Missing crypto suite".to_string()))?
            .to_string();

        let key_params = parts
            .next()
            .ok_or_else(|| Error::ParseError("Missing key parameters".to_string()))?;

        let (key_method, key_info) = key_params
            .split_once(':')
            .ok_or_else(|| Error::ParseError(format!("Invalid key parameters: {}", key_params)))?;

        if key_info.is_empty() {
            return Err(Error::ParseError("Empty key info".to_string()));
        }

        let session_params = parts
            .flat_map(|p| p.split(';'))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            tag,
            crypto_suite,
            key_method: key_method.to_string(),
            key_info: key_info.to_string(),
            session_params,
        })
    }

    /// The base64 key material with any lifetime or MKI suffix removed
    pub fn key_material(&self) -> &str {
        self.key_info.split('|').next().unwrap_or_default()
    }

    pub fn is_inline(&self) -> bool {
        self.key_method.eq_ignore_ascii_case("inline")
    }
}

impl FromStr for SdesCryptoAttribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SdesCryptoAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}:{}", self.tag, self.crypto_suite, self.key_method, self.key_info)?;
        if !self.session_params.is_empty() {
            write!(f, " {}", self.session_params.join(";"))?;
        }
        Ok(())
    }
}
