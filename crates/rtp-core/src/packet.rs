use bitvec::prelude::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::error::Error;
use crate::{Result, RtpCsrc, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP protocol version (always 2 in practice)
pub const RTP_VERSION: u8 = 2;

/// Minimum header size (without CSRC or extensions)
pub const RTP_MIN_HEADER_SIZE: usize = 12;

/// RTP header implementation according to RFC 3550
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// RTP version (should be 2)
    pub version: u8,

    /// Padding flag
    pub padding: bool,

    /// Extension flag
    pub extension: bool,

    /// CSRC count (number of contributing sources)
    pub cc: u8,

    /// Marker bit
    pub marker: bool,

    /// Payload type
    pub payload_type: u8,

    /// Sequence number
    pub sequence_number: RtpSequenceNumber,

    /// Timestamp
    pub timestamp: RtpTimestamp,

    /// Synchronization source identifier
    pub ssrc: RtpSsrc,

    /// Contributing source identifiers
    pub csrc: Vec<RtpCsrc>,

    /// Extension header profile
    pub extension_id: Option<u16>,

    /// Extension data, padded to a 32-bit boundary on the wire
    pub extension_data: Option<Bytes>,
}

impl Default for RtpHeader {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl RtpHeader {
    /// Create a new RTP header with default values
    pub fn new(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
    ) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            cc: 0,
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            extension_id: None,
            extension_data: None,
        }
    }

    /// Get the size of the header in bytes
    pub fn size(&self) -> usize {
        let mut size = RTP_MIN_HEADER_SIZE + self.csrc.len() * 4;

        if self.extension {
            let data_len = self.extension_data.as_ref().map_or(0, |d| d.len());
            size += 4 + (data_len + 3) / 4 * 4;
        }

        size
    }

    /// Parse an RTP header from bytes
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < RTP_MIN_HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                required: RTP_MIN_HEADER_SIZE,
                available: buf.remaining(),
            });
        }

        // First byte: version (2 bits), padding (1 bit), extension (1 bit), CSRC count (4 bits)
        let first_byte = buf.get_u8();
        let bits = first_byte.view_bits::<Msb0>();

        let version = bits[0..2].load_be::<u8>();
        if version != RTP_VERSION {
            return Err(Error::InvalidPacket(format!("Invalid RTP version: {}", version)));
        }

        let padding = bits[2];
        let extension = bits[3];
        let cc = bits[4..8].load_be::<u8>();

        // Second byte: marker (1 bit), payload type (7 bits)
        let second_byte = buf.get_u8();
        let bits = second_byte.view_bits::<Msb0>();

        let marker = bits[0];
        let payload_type = bits[1..8].load_be::<u8>();

        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        let csrc_len = cc as usize * 4;
        if buf.remaining() < csrc_len {
            return Err(Error::BufferTooSmall {
                required: csrc_len,
                available: buf.remaining(),
            });
        }
        let csrc = (0..cc).map(|_| buf.get_u32()).collect();

        let (extension_id, extension_data) = if extension {
            if buf.remaining() < 4 {
                return Err(Error::BufferTooSmall {
                    required: 4,
                    available: buf.remaining(),
                });
            }

            let ext_id = buf.get_u16();
            let ext_length = buf.get_u16() as usize * 4; // Length in 32-bit words

            if buf.remaining() < ext_length {
                return Err(Error::BufferTooSmall {
                    required: ext_length,
                    available: buf.remaining(),
                });
            }

            (Some(ext_id), Some(buf.copy_to_bytes(ext_length)))
        } else {
            (None, None)
        };

        Ok(Self {
            version,
            padding,
            extension,
            cc,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension_id,
            extension_data,
        })
    }

    /// Serialize the header to bytes
    pub fn serialize(&self, buf: &mut BytesMut) -> Result<()> {
        if self.cc as usize != self.csrc.len() {
            return Err(Error::InvalidParameter(format!(
                "CSRC count ({}) does not match CSRC list length ({})",
                self.cc,
                self.csrc.len()
            )));
        }
        if self.payload_type > 0x7F {
            return Err(Error::InvalidParameter(format!(
                "Payload type {} does not fit in 7 bits",
                self.payload_type
            )));
        }

        buf.reserve(self.size());

        let mut first_byte = 0u8;
        {
            let bits = first_byte.view_bits_mut::<Msb0>();
            bits[0..2].store_be(self.version & 0x03);
            bits.set(2, self.padding);
            bits.set(3, self.extension);
            bits[4..8].store_be(self.cc & 0x0F);
        }
        buf.put_u8(first_byte);

        let mut second_byte = 0u8;
        {
            let bits = second_byte.view_bits_mut::<Msb0>();
            bits.set(0, self.marker);
            bits[1..8].store_be(self.payload_type);
        }
        buf.put_u8(second_byte);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);

        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if self.extension {
            let (Some(ext_id), Some(ext_data)) = (self.extension_id, &self.extension_data) else {
                return Err(Error::InvalidParameter(
                    "Extension flag is set but extension data is missing".to_string(),
                ));
            };

            buf.put_u16(ext_id);
            buf.put_u16(((ext_data.len() + 3) / 4) as u16);
            buf.put_slice(ext_data);
            buf.put_bytes(0, (4 - ext_data.len() % 4) % 4);
        }

        Ok(())
    }
}

/// RTP packet implementation
#[derive(Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// RTP header
    pub header: RtpHeader,

    /// Payload data
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a new RTP packet
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a new RTP packet with basic parameters
    pub fn new_with_payload(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
        payload: Bytes,
    ) -> Self {
        let header = RtpHeader::new(payload_type, sequence_number, timestamp, ssrc);
        Self { header, payload }
    }

    /// Get the total size of the packet in bytes
    pub fn size(&self) -> usize {
        self.header.size() + self.payload.len()
    }

    /// Parse an RTP packet from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = Bytes::copy_from_slice(data);

        let header = RtpHeader::parse(&mut buf)?;

        let padding_bytes = if header.padding && !buf.is_empty() {
            let padding = buf[buf.len() - 1] as usize;
            if padding == 0 || padding > buf.len() {
                return Err(Error::InvalidPacket(format!(
                    "Invalid padding value: {} with {} remaining bytes",
                    padding,
                    buf.len()
                )));
            }
            padding
        } else {
            0
        };

        let payload_len = buf.len() - padding_bytes;
        let payload = buf.slice(0..payload_len);

        Ok(Self { header, payload })
    }

    /// Serialize the packet into a buffer that later stages may grow in place
    pub fn serialize_mut(&self) -> Result<BytesMut> {
        // Room for an SRTP tag so protection does not reallocate
        let mut buf = BytesMut::with_capacity(self.size() + 16);
        self.header.serialize(&mut buf)?;
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Serialize the packet to bytes
    pub fn serialize(&self) -> Result<Bytes> {
        Ok(self.serialize_mut()?.freeze())
    }
}

impl fmt::Debug for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpPacket")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
