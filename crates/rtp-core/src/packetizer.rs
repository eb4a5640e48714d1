//! Outbound RTP header sequencing for a single media stream.

use bytes::BytesMut;
use rand::Rng;

use crate::packet::RtpHeader;
use crate::{Result, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// Produces the RTP header for each outgoing frame of one stream.
///
/// The first header carries the marker bit. Sequence numbers start at a
/// non-zero base and advance by one per packet; timestamps start at zero and
/// advance by the fixed frame size.
#[derive(Debug, Clone)]
pub struct RtpPacketizer {
    payload_type: u8,
    ssrc: RtpSsrc,
    samples_per_frame: u32,
    sequence_base: RtpSequenceNumber,
    next_sequence: RtpSequenceNumber,
    next_timestamp: RtpTimestamp,
    packets: u64,
}

impl RtpPacketizer {
    /// Create a packetizer with a random SSRC and a random non-zero sequence base
    pub fn new(payload_type: u8, samples_per_frame: u32) -> Self {
        let mut rng = rand::thread_rng();
        let ssrc = rng.r#gen::<u32>();
        let base = rng.gen_range(1..=u16::MAX);
        Self::with_sequence_base(payload_type, ssrc, samples_per_frame, base)
    }

    pub fn with_sequence_base(
        payload_type: u8,
        ssrc: RtpSsrc,
        samples_per_frame: u32,
        sequence_base: RtpSequenceNumber,
    ) -> Self {
        Self {
            payload_type,
            ssrc,
            samples_per_frame,
            sequence_base,
            next_sequence: sequence_base,
            next_timestamp: 0,
            packets: 0,
        }
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn sequence_base(&self) -> RtpSequenceNumber {
        self.sequence_base
    }

    /// Number of headers produced so far
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Produce the header for the next frame and advance the stream position
    pub fn next_header(&mut self) -> RtpHeader {
        let mut header = RtpHeader::new(
            self.payload_type,
            self.next_sequence,
            self.next_timestamp,
            self.ssrc,
        );
        header.marker = self.packets == 0;

        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.next_timestamp = self.next_timestamp.wrapping_add(self.samples_per_frame);
        self.packets += 1;

        header
    }

    /// Write the next header followed by `payload` into a fresh packet buffer
    pub fn packetize(&mut self, payload: &[u8]) -> Result<BytesMut> {
        let header = self.next_header();
        // Room for an SRTP tag so protection does not reallocate
        let mut buf = BytesMut::with_capacity(header.size() + payload.len() + 16);
        header.serialize(&mut buf)?;
        buf.extend_from_slice(payload);
        Ok(buf)
    }
}
