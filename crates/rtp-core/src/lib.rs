//! RTP Core library for voxcall
//!
//! This crate provides the media transport primitives used by a voice call:
//!
//! - `packet`: RTP packet definitions and processing
//! - `packetizer`: per-call RTP header sequencing (sequence, timestamp, marker)
//! - `srtp`: Secure RTP (AES-CM-128 with HMAC-SHA1) per RFC 3711
//! - `security`: SDES `a=crypto` attribute handling for key exchange in SDP
//! - `transport`: datagram transport used to move media packets

mod error;

pub mod packet;
pub mod packetizer;
pub mod security;
pub mod srtp;
pub mod transport;

pub use error::Error;

pub use packet::{RtpHeader, RtpPacket};
pub use packetizer::RtpPacketizer;
pub use security::sdes::SdesCryptoAttribute;
pub use srtp::{
    SrtpContext, SrtpCryptoKey, SrtpCryptoSuite, SRTP_AES128_CM_SHA1_32, SRTP_AES128_CM_SHA1_80,
};
pub use transport::{MediaTransport, UdpMediaTransport};

/// The default maximum size for RTP packets in bytes
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1500;

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Typedef for RTP synchronization source identifier
pub type RtpSsrc = u32;

/// Typedef for RTP contributing source identifier
pub type RtpCsrc = u32;

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        Error, MediaTransport, Result, RtpCsrc, RtpHeader, RtpPacket, RtpPacketizer,
        RtpSequenceNumber, RtpSsrc, RtpTimestamp, SdesCryptoAttribute, SrtpContext,
        SrtpCryptoKey, SrtpCryptoSuite,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tracing::debug;

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_protected_packet_survives_parse() {
        init_test_logging();

        let key = SrtpCryptoKey::new(vec![7; 16], vec![9; 14]);
        let mut tx = SrtpContext::new(SRTP_AES128_CM_SHA1_80, &key, 64).unwrap();
        let mut rx = SrtpContext::new(SRTP_AES128_CM_SHA1_80, &key, 64).unwrap();

        let packet = RtpPacket::new_with_payload(116, 4000, 960, 0xdeadbeef, Bytes::from_static(b"opus frame"));
        let mut wire = packet.serialize_mut().unwrap();
        tx.protect(&mut wire).unwrap();
        debug!("protected packet is {} bytes", wire.len());

        // Header stays in the clear
        let header = RtpHeader::parse(&mut &wire[..]).unwrap();
        assert_eq!(header.sequence_number, 4000);
        assert_eq!(header.ssrc, 0xdeadbeef);

        rx.unprotect(&mut wire).unwrap();
        let parsed = RtpPacket::parse(&wire).unwrap();
        assert_eq!(&parsed.payload[..], b"opus frame");
    }
}
