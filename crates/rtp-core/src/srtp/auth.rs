use bitvec::prelude::*;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::SrtpAuthenticationAlgorithm;
use crate::error::Error;
use crate::Result;

type HmacSha1 = Hmac<Sha1>;

/// SRTP Authentication Handler
pub struct SrtpAuthenticator {
    algorithm: SrtpAuthenticationAlgorithm,

    /// Session authentication key
    auth_key: Vec<u8>,

    /// Authentication tag length in bytes
    tag_length: usize,
}

impl SrtpAuthenticator {
    pub fn new(algorithm: SrtpAuthenticationAlgorithm, auth_key: Vec<u8>, tag_length: usize) -> Self {
        Self {
            algorithm,
            auth_key,
            tag_length,
        }
    }

    fn mac(&self, packet_data: &[u8], roc: u32) -> Result<HmacSha1> {
        let mut mac = HmacSha1::new_from_slice(&self.auth_key)
            .map_err(|e| Error::SrtpError(format!("Failed to create HMAC: {}", e)))?;
        mac.update(packet_data);
        mac.update(&roc.to_be_bytes());
        Ok(mac)
    }

    /// Calculate the truncated tag over `packet_data || ROC`
    pub fn calculate_auth_tag(&self, packet_data: &[u8], roc: u32) -> Result<Vec<u8>> {
        let result = self.mac(packet_data, roc)?.finalize().into_bytes();
        Ok(result[..self.tag_length].to_vec())
    }

    /// Verify a received tag in constant time
    pub fn verify_auth_tag(&self, packet_data: &[u8], tag: &[u8], roc: u32) -> Result<bool> {
        if tag.len() != self.tag_length {
            return Err(Error::SrtpError(format!(
                "Authentication tag length mismatch: expected {}, got {}",
                self.tag_length,
                tag.len()
            )));
        }

        Ok(self.mac(packet_data, roc)?.verify_truncated_left(tag).is_ok())
    }

    pub fn tag_length(&self) -> usize {
        self.tag_length
    }

    pub fn algorithm(&self) -> SrtpAuthenticationAlgorithm {
        self.algorithm
    }
}

/// SRTP replay protection over 48-bit packet indices.
///
/// Bit `i` of the window records whether index `highest - i` has been
/// accepted.
pub struct SrtpReplayProtection {
    window_size: u64,
    highest: Option<u64>,
    window: BitVec,
}

impl SrtpReplayProtection {
    pub fn new(window_size: u64) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            highest: None,
            window: bitvec![0; window_size as usize],
        }
    }

    /// Whether `index` may still be accepted. Does not record it.
    pub fn check(&self, index: u64) -> bool {
        let Some(highest) = self.highest else {
            return true;
        };

        if index > highest {
            return true;
        }

        let delta = highest - index;
        delta < self.window_size && !self.window[delta as usize]
    }

    /// Record `index` as accepted
    pub fn update(&mut self, index: u64) {
        let Some(highest) = self.highest else {
            self.window.fill(false);
            self.window.set(0, true);
            self.highest = Some(index);
            return;
        };

        if index > highest {
            let diff = index - highest;
            if diff >= self.window_size {
                self.window.fill(false);
            } else {
                self.window.shift_right(diff as usize);
            }
            self.window.set(0, true);
            self.highest = Some(index);
        } else {
            let delta = highest - index;
            if delta < self.window_size {
                self.window.set(delta as usize, true);
            }
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }
}
