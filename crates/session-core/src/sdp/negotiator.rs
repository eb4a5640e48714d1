//! Offer/answer negotiation for one call

use std::net::{IpAddr, SocketAddr};

use rand::Rng;
use tracing::{debug, info};
use voxcall_media_core::CodecDescriptor;

use super::description::{MediaDescription, Origin, RtpMap, SessionDescription};
use crate::errors::NegotiationError;
use crate::media::MediaCrypto;

const SESSION_NAME: &str = "voxcall";

/// Where the offer/answer exchange stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Initial,
    OfferSent,
    OfferReceived,
    Complete,
}

/// The outcome of decoding the peer's description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedMedia {
    /// Where to send RTP
    pub remote_addr: SocketAddr,
    /// Our codec under the payload type the peer used for it
    pub codec: CodecDescriptor,
    /// Whether the peer's key was adopted for the receive direction
    pub crypto_adopted: bool,
}

/// Builds our descriptions and decodes the peer's.
///
/// Owns the call's [`MediaCrypto`] so that decoding a description can adopt
/// the peer's key in the same step.
pub struct SessionNegotiator {
    local_addr: SocketAddr,
    codec: CodecDescriptor,
    crypto: MediaCrypto,
    state: NegotiationState,
    session_id: u64,
    version: u64,
    negotiated: Option<NegotiatedMedia>,
}

impl SessionNegotiator {
    /// `codec` carries the payload type we advertise in offers
    pub fn new(local_addr: SocketAddr, codec: CodecDescriptor, crypto: MediaCrypto) -> Self {
        Self {
            local_addr,
            codec,
            crypto,
            state: NegotiationState::Initial,
            session_id: rand::thread_rng().gen_range(1..u32::MAX as u64),
            version: 0,
            negotiated: None,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn negotiated(&self) -> Option<&NegotiatedMedia> {
        self.negotiated.as_ref()
    }

    pub fn crypto(&self) -> &MediaCrypto {
        &self.crypto
    }

    pub fn crypto_mut(&mut self) -> &mut MediaCrypto {
        &mut self.crypto
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Our offer: media address, crypto line and the supported format
    pub fn build_offer(&mut self) -> Result<Vec<u8>, NegotiationError> {
        let description = self.describe(self.codec.payload_type);
        self.state = NegotiationState::OfferSent;
        debug!("Built offer for {}", self.local_addr);
        Ok(description.to_string().into_bytes())
    }

    /// Our answer to the offer last decoded, mirroring its payload type
    pub fn build_answer(&mut self) -> Result<Vec<u8>, NegotiationError> {
        if self.state != NegotiationState::OfferReceived {
            return Err(NegotiationError::MissingMedia);
        }
        let payload_type = self
            .negotiated
            .as_ref()
            .map(|n| n.codec.payload_type)
            .ok_or(NegotiationError::MissingMedia)?;

        let description = self.describe(payload_type);
        self.state = NegotiationState::Complete;
        debug!("Built answer for {}", self.local_addr);
        Ok(description.to_string().into_bytes())
    }

    /// Decode the peer's offer or answer.
    ///
    /// Selects our codec by name, records the peer's media address and
    /// adopts the first acceptable crypto line. A failed decode leaves the
    /// previous negotiation state untouched.
    pub fn decode_remote(&mut self, bytes: &[u8], is_offer: bool) -> Result<NegotiatedMedia, NegotiationError> {
        if !is_offer && self.state != NegotiationState::OfferSent {
            return Err(NegotiationError::UnexpectedAnswer);
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| NegotiationError::Malformed(format!("not UTF-8: {}", e)))?;
        let description = SessionDescription::parse(text)?;

        let audio = description.audio().ok_or(NegotiationError::MissingMedia)?;
        if audio.port == 0 {
            return Err(NegotiationError::MissingMedia);
        }
        let ip = description
            .connection_for(audio)
            .ok_or(NegotiationError::MissingMedia)?;

        let payload_type = audio
            .formats
            .iter()
            .copied()
            .find(|pt| {
                audio
                    .rtpmap(*pt)
                    .is_some_and(|map| self.codec.matches(&map.encoding, map.clock_rate))
            })
            .ok_or(NegotiationError::NoCommonFormat)?;

        for line in audio.crypto.iter().filter(|c| c.is_inline()) {
            if self.crypto.try_adopt_remote_key(&line.crypto_suite, line.key_material()) {
                break;
            }
        }

        let negotiated = NegotiatedMedia {
            remote_addr: SocketAddr::new(ip, audio.port),
            codec: self.codec.with_payload_type(payload_type),
            crypto_adopted: self.crypto.has_receive_context(),
        };

        info!(
            "Negotiated {} (pt {}) with {}{}",
            negotiated.codec.name,
            payload_type,
            negotiated.remote_addr,
            if negotiated.crypto_adopted { ", SRTP" } else { "" }
        );

        self.state = if is_offer {
            NegotiationState::OfferReceived
        } else {
            NegotiationState::Complete
        };
        self.negotiated = Some(negotiated.clone());
        Ok(negotiated)
    }

    fn describe(&mut self, payload_type: u8) -> SessionDescription {
        self.version += 1;
        let ip: IpAddr = self.local_addr.ip();

        let crypto = self.crypto.local_crypto_attribute();
        let protocol = if crypto.is_some() { "RTP/SAVP" } else { "RTP/AVP" };

        let mut audio = MediaDescription::audio(self.local_addr.port(), protocol);
        audio.formats.push(payload_type);
        audio.rtpmaps.push(RtpMap {
            payload_type,
            encoding: self.codec.name.clone(),
            clock_rate: self.codec.clock_rate,
            channels: (self.codec.channels > 1).then_some(self.codec.channels),
        });
        audio.crypto.extend(crypto);

        SessionDescription {
            origin: Origin {
                username: "-".to_string(),
                session_id: self.session_id,
                version: self.version,
                address: ip,
            },
            session_name: SESSION_NAME.to_string(),
            connection: Some(ip),
            media: vec![audio],
        }
    }
}
