//! Media encryption state for one call
//!
//! The transmit context is generated locally when the call starts. The
//! receive context is built from the first valid `a=crypto` line the peer
//! sends and is never replaced afterwards.

use bytes::BytesMut;
use tracing::{debug, warn};
use voxcall_rtp_core::{
    Error as RtpError, SdesCryptoAttribute, SrtpContext, SrtpCryptoKey, SrtpCryptoSuite,
};

use crate::errors::Result;

/// SDES tag used for our single crypto line
const LOCAL_CRYPTO_TAG: u32 = 1;

pub struct MediaCrypto {
    suite: Option<SrtpCryptoSuite>,
    replay_window: u64,
    local_key: Option<SrtpCryptoKey>,
    transmit: Option<SrtpContext>,
    receive: Option<SrtpContext>,
}

impl MediaCrypto {
    /// `suite` of `None` means plain RTP in both directions
    pub fn new(suite: Option<SrtpCryptoSuite>, replay_window: u64) -> Self {
        Self {
            suite,
            replay_window,
            local_key: None,
            transmit: None,
            receive: None,
        }
    }

    /// Generate a fresh key sized for `suite` and the context that uses it.
    ///
    /// Returns the context and the base64 `key||salt` for the session
    /// description.
    pub fn new_transmit_context(suite: SrtpCryptoSuite, replay_window: u64) -> Result<(SrtpContext, String)> {
        let key = SrtpCryptoKey::random(&suite);
        let context = SrtpContext::new(suite, &key, replay_window)?;
        Ok((context, key.to_base64()))
    }

    /// Create the transmit context if a suite is configured and none exists
    pub fn init_transmit(&mut self) -> Result<()> {
        let Some(suite) = self.suite else {
            return Ok(());
        };
        if self.local_key.is_some() {
            return Ok(());
        }

        let (context, encoded) = Self::new_transmit_context(suite, self.replay_window)?;
        self.local_key = Some(SrtpCryptoKey::from_base64(&suite, &encoded)?);
        self.transmit = Some(context);
        debug!("Generated {} transmit key", suite.name);
        Ok(())
    }

    /// Build the receive context from a remote key.
    ///
    /// Returns false without doing anything if a receive context already
    /// exists, no suite is configured, or `suite_name` is not ours. Returns
    /// false after logging if the key does not decode to the suite's length.
    pub fn try_adopt_remote_key(&mut self, suite_name: &str, key_base64: &str) -> bool {
        if self.receive.is_some() {
            return false;
        }
        let Some(suite) = self.suite else {
            return false;
        };
        if !suite.name.eq_ignore_ascii_case(suite_name) {
            debug!("Ignoring remote key for suite {} (configured {})", suite_name, suite.name);
            return false;
        }

        let context = SrtpCryptoKey::from_base64(&suite, key_base64)
            .and_then(|key| SrtpContext::new(suite, &key, self.replay_window));
        match context {
            Ok(context) => {
                self.receive = Some(context);
                debug!("Adopted remote {} key", suite.name);
                true
            }
            Err(e) => {
                warn!("Rejected remote {} key: {}", suite.name, e);
                false
            }
        }
    }

    pub fn suite(&self) -> Option<&SrtpCryptoSuite> {
        self.suite.as_ref()
    }

    pub fn has_transmit_context(&self) -> bool {
        self.transmit.is_some()
    }

    pub fn has_receive_context(&self) -> bool {
        self.receive.is_some()
    }

    /// Our `a=crypto` line, once the transmit key exists
    pub fn local_crypto_attribute(&self) -> Option<SdesCryptoAttribute> {
        let suite = self.suite.as_ref()?;
        let key = self.local_key.as_ref()?;
        Some(SdesCryptoAttribute::new(LOCAL_CRYPTO_TAG, suite, key))
    }

    /// Hand the transmit context to the send loop
    pub fn take_transmit_context(&mut self) -> Option<SrtpContext> {
        self.transmit.take()
    }

    /// Protect one outgoing packet in place
    pub fn encrypt(&mut self, packet: &mut BytesMut) -> Result<()> {
        let context = self
            .transmit
            .as_mut()
            .ok_or_else(|| RtpError::SrtpError("no transmit context".to_string()))?;
        context.protect(packet)?;
        Ok(())
    }

    /// Verify and decrypt one incoming packet in place
    pub fn decrypt(&mut self, packet: &mut BytesMut) -> Result<()> {
        let context = self
            .receive
            .as_mut()
            .ok_or_else(|| RtpError::SrtpError("no receive context".to_string()))?;
        context.unprotect(packet)?;
        Ok(())
    }
}

impl std::fmt::Debug for MediaCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCrypto")
            .field("suite", &self.suite.map(|s| s.name))
            .field("transmit", &self.transmit.is_some())
            .field("receive", &self.receive.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SessionError;
    use voxcall_rtp_core::{RtpPacketizer, SRTP_AES128_CM_SHA1_32, SRTP_AES128_CM_SHA1_80};

    fn packet() -> BytesMut {
        RtpPacketizer::with_sequence_base(116, 42, 960, 1000)
            .packetize(&[0x55; 40])
            .unwrap()
    }

    #[test]
    fn test_transmit_context_lengths() {
        let (_, encoded) = MediaCrypto::new_transmit_context(SRTP_AES128_CM_SHA1_80, 64).unwrap();
        let key = SrtpCryptoKey::from_base64(&SRTP_AES128_CM_SHA1_80, &encoded).unwrap();
        assert_eq!(key.key().len(), 16);
        assert_eq!(key.salt().len(), 14);

        let mut crypto = MediaCrypto::new(Some(SRTP_AES128_CM_SHA1_80), 64);
        crypto.init_transmit().unwrap();
        let mut wire = packet();
        let plain_len = wire.len();
        crypto.encrypt(&mut wire).unwrap();
        assert_eq!(wire.len(), plain_len + 10);
    }

    #[test]
    fn test_first_remote_key_wins() {
        let mut local = MediaCrypto::new(Some(SRTP_AES128_CM_SHA1_80), 64);
        local.init_transmit().unwrap();
        let line = local.local_crypto_attribute().unwrap();

        let mut remote = MediaCrypto::new(Some(SRTP_AES128_CM_SHA1_80), 64);
        assert!(remote.try_adopt_remote_key(&line.crypto_suite, line.key_material()));
        assert!(remote.has_receive_context());

        let (_, other) = MediaCrypto::new_transmit_context(SRTP_AES128_CM_SHA1_80, 64).unwrap();
        assert!(!remote.try_adopt_remote_key(&line.crypto_suite, &other));

        // Still decrypts with the first key
        let mut wire = packet();
        local.encrypt(&mut wire).unwrap();
        remote.decrypt(&mut wire).unwrap();
        assert_eq!(wire, packet());
    }

    #[test]
    fn test_suite_mismatch_is_ignored() {
        let mut crypto = MediaCrypto::new(Some(SRTP_AES128_CM_SHA1_80), 64);
        let (_, key) = MediaCrypto::new_transmit_context(SRTP_AES128_CM_SHA1_32, 64).unwrap();
        assert!(!crypto.try_adopt_remote_key(SRTP_AES128_CM_SHA1_32.name, &key));
        assert!(!crypto.has_receive_context());

        let mut wire = packet();
        assert!(matches!(crypto.decrypt(&mut wire), Err(SessionError::Rtp(_))));
    }

    #[test]
    fn test_bad_key_length_is_ignored() {
        let mut crypto = MediaCrypto::new(Some(SRTP_AES128_CM_SHA1_80), 64);
        assert!(!crypto.try_adopt_remote_key("AES_CM_128_HMAC_SHA1_80", "AAAA"));
        assert!(!crypto.try_adopt_remote_key("AES_CM_128_HMAC_SHA1_80", "***"));
        assert!(!crypto.has_receive_context());
    }

    #[test]
    fn test_plain_rtp_has_no_crypto_line() {
        let mut crypto = MediaCrypto::new(None, 64);
        crypto.init_transmit().unwrap();
        assert!(crypto.local_crypto_attribute().is_none());
        assert!(!crypto.try_adopt_remote_key("AES_CM_128_HMAC_SHA1_80", "AAAA"));
        assert!(crypto.take_transmit_context().is_none());
    }

    #[test]
    fn test_taken_transmit_context_leaves_none() {
        let mut crypto = MediaCrypto::new(Some(SRTP_AES128_CM_SHA1_80), 64);
        crypto.init_transmit().unwrap();
        assert!(crypto.take_transmit_context().is_some());
        assert!(!crypto.has_transmit_context());
        // The line stays valid for the session description
        assert!(crypto.local_crypto_attribute().is_some());
        assert!(crypto.encrypt(&mut packet()).is_err());
    }
}
