//! Secure RTP (SRTP) implementation
//!
//! This module provides encryption and authentication for RTP packets as
//! described in RFC 3711: AES in counter mode for confidentiality and
//! HMAC-SHA1 for integrity, with session keys derived from a master
//! key/salt pair exchanged out of band (SDES).

pub mod auth;
pub mod crypto;
pub mod key_derivation;

use aes::cipher::{KeyIvInit, StreamCipher};
use bytes::BytesMut;
use tracing::trace;

use crate::error::Error;
use crate::packet::{RtpHeader, RTP_MIN_HEADER_SIZE};
use crate::Result;

pub use auth::{SrtpAuthenticator, SrtpReplayProtection};
pub use crypto::SrtpCryptoKey;
pub use key_derivation::{create_srtp_iv, srtp_kdf, KeyDerivationLabel};

pub(crate) type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Session encryption key length for AES-128
const SESSION_KEY_LEN: usize = 16;

/// Session authentication key length for HMAC-SHA1
const SESSION_AUTH_KEY_LEN: usize = 20;

/// Session salt length
const SESSION_SALT_LEN: usize = 14;

/// SRTP authentication algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtpAuthenticationAlgorithm {
    /// HMAC-SHA1 truncated to 80 bits (Default in SRTP)
    HmacSha1_80,

    /// HMAC-SHA1 truncated to 32 bits
    HmacSha1_32,
}

/// SRTP crypto suite
///
/// Key, salt and tag lengths are a pure function of the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrtpCryptoSuite {
    /// SDES name of the suite as it appears in `a=crypto`
    pub name: &'static str,

    /// Authentication algorithm
    pub authentication: SrtpAuthenticationAlgorithm,

    /// Master key length in bytes
    pub key_length: usize,

    /// Master salt length in bytes
    pub salt_length: usize,

    /// Authentication tag length in bytes
    pub tag_length: usize,
}

/// Default SRTP crypto suite: AES-CM-128 + HMAC-SHA1-80
pub const SRTP_AES128_CM_SHA1_80: SrtpCryptoSuite = SrtpCryptoSuite {
    name: "AES_CM_128_HMAC_SHA1_80",
    authentication: SrtpAuthenticationAlgorithm::HmacSha1_80,
    key_length: 16, // 128 bits
    salt_length: 14, // 112 bits
    tag_length: 10, // 80 bits
};

/// Smaller tag SRTP crypto suite: AES-CM-128 + HMAC-SHA1-32
pub const SRTP_AES128_CM_SHA1_32: SrtpCryptoSuite = SrtpCryptoSuite {
    name: "AES_CM_128_HMAC_SHA1_32",
    authentication: SrtpAuthenticationAlgorithm::HmacSha1_32,
    key_length: 16,
    salt_length: 14,
    tag_length: 4, // 32 bits
};

impl SrtpCryptoSuite {
    /// Look up a suite by its SDES name
    pub fn from_name(name: &str) -> Option<Self> {
        [SRTP_AES128_CM_SHA1_80, SRTP_AES128_CM_SHA1_32]
            .into_iter()
            .find(|suite| suite.name.eq_ignore_ascii_case(name))
    }

    /// Length of the concatenated key and salt carried in `inline:` key params
    pub fn master_length(&self) -> usize {
        self.key_length + self.salt_length
    }
}

/// SRTP context for one direction of one stream.
///
/// Packets are transformed in place: `protect` encrypts the payload and
/// appends the authentication tag, `unprotect` verifies and strips the tag
/// and decrypts the payload.
pub struct SrtpContext {
    suite: SrtpCryptoSuite,

    /// Session encryption key
    session_key: [u8; SESSION_KEY_LEN],

    /// Session salt used to build the counter-mode IV
    session_salt: [u8; SESSION_SALT_LEN],

    authenticator: SrtpAuthenticator,

    replay_protection: SrtpReplayProtection,

    /// Roll-over counter
    roc: u32,

    /// Highest sequence number seen with the current ROC
    s_l: Option<u16>,
}

impl SrtpContext {
    /// Create a new SRTP context, deriving the session keys from `master_key`
    pub fn new(suite: SrtpCryptoSuite, master_key: &SrtpCryptoKey, replay_window: u64) -> Result<Self> {
        master_key.validate(&suite)?;

        let enc = srtp_kdf(master_key, KeyDerivationLabel::RtpEncryption, SESSION_KEY_LEN)?;
        let auth = srtp_kdf(master_key, KeyDerivationLabel::RtpAuthentication, SESSION_AUTH_KEY_LEN)?;
        let salt = srtp_kdf(master_key, KeyDerivationLabel::RtpSalt, SESSION_SALT_LEN)?;

        let mut session_key = [0u8; SESSION_KEY_LEN];
        session_key.copy_from_slice(&enc);
        let mut session_salt = [0u8; SESSION_SALT_LEN];
        session_salt.copy_from_slice(&salt);

        Ok(Self {
            suite,
            session_key,
            session_salt,
            authenticator: SrtpAuthenticator::new(suite.authentication, auth, suite.tag_length),
            replay_protection: SrtpReplayProtection::new(replay_window),
            roc: 0,
            s_l: None,
        })
    }

    pub fn suite(&self) -> &SrtpCryptoSuite {
        &self.suite
    }

    /// Current roll-over counter
    pub fn roc(&self) -> u32 {
        self.roc
    }

    /// Estimate the ROC for `seq` (RFC 3711 Appendix A)
    fn estimate_roc(&self, seq: u16) -> u32 {
        let Some(s_l) = self.s_l else {
            return self.roc;
        };

        if s_l < 0x8000 {
            if seq > s_l && seq - s_l > 0x8000 {
                self.roc.wrapping_sub(1)
            } else {
                self.roc
            }
        } else if s_l - 0x8000 > seq {
            self.roc.wrapping_add(1)
        } else {
            self.roc
        }
    }

    fn packet_index(roc: u32, seq: u16) -> u64 {
        ((roc as u64) << 16) | seq as u64
    }

    /// Record that a packet with this ROC/sequence pair has been accepted
    fn commit_index(&mut self, roc: u32, seq: u16) {
        match self.s_l {
            None => {
                self.roc = roc;
                self.s_l = Some(seq);
            }
            Some(s_l) => {
                if roc == self.roc.wrapping_add(1) {
                    self.roc = roc;
                    self.s_l = Some(seq);
                } else if roc == self.roc && seq > s_l {
                    self.s_l = Some(seq);
                }
            }
        }
    }

    fn apply_keystream(&self, ssrc: u32, index: u64, data: &mut [u8]) -> Result<()> {
        let iv = create_srtp_iv(&self.session_salt, ssrc, index)?;
        let mut cipher = Aes128Ctr::new(self.session_key.as_slice().into(), iv.as_slice().into());
        cipher.apply_keystream(data);
        Ok(())
    }

    /// Encrypt an RTP packet in place and append the authentication tag
    pub fn protect(&mut self, packet: &mut BytesMut) -> Result<()> {
        let header = RtpHeader::parse(&mut &packet[..])?;
        let header_size = header.size();
        let seq = header.sequence_number;

        let roc = self.estimate_roc(seq);
        let index = Self::packet_index(roc, seq);
        self.commit_index(roc, seq);

        self.apply_keystream(header.ssrc, index, &mut packet[header_size..])?;

        let tag = self.authenticator.calculate_auth_tag(&packet[..], roc)?;
        packet.extend_from_slice(&tag);

        trace!("SRTP protected seq={} index={} len={}", seq, index, packet.len());
        Ok(())
    }

    /// Verify, strip the tag from and decrypt an SRTP packet in place
    pub fn unprotect(&mut self, packet: &mut BytesMut) -> Result<()> {
        let tag_len = self.authenticator.tag_length();
        if packet.len() < RTP_MIN_HEADER_SIZE + tag_len {
            return Err(Error::BufferTooSmall {
                required: RTP_MIN_HEADER_SIZE + tag_len,
                available: packet.len(),
            });
        }

        let auth_len = packet.len() - tag_len;
        let header = RtpHeader::parse(&mut &packet[..auth_len])?;
        let header_size = header.size();
        let seq = header.sequence_number;

        let roc = self.estimate_roc(seq);
        let index = Self::packet_index(roc, seq);

        if !self.replay_protection.check(index) {
            return Err(Error::ReplayDetected(index));
        }

        if !self
            .authenticator
            .verify_auth_tag(&packet[..auth_len], &packet[auth_len..], roc)?
        {
            return Err(Error::AuthenticationFailed);
        }

        self.replay_protection.update(index);
        self.commit_index(roc, seq);

        packet.truncate(auth_len);
        self.apply_keystream(header.ssrc, index, &mut packet[header_size..])?;

        trace!("SRTP unprotected seq={} index={}", seq, index);
        Ok(())
    }
}

impl std::fmt::Debug for SrtpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrtpContext")
            .field("suite", &self.suite.name)
            .field("session_key", &"[REDACTED]")
            .field("roc", &self.roc)
            .field("s_l", &self.s_l)
            .finish()
    }
}
