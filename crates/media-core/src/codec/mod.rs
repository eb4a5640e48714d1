//! Audio codecs
//!
//! A codec works on one fixed-size frame at a time. Frame size and maximum
//! encoded size are agreed when the encoder/decoder pair is built, so the
//! media threads can allocate their buffers once.

pub mod g711;
#[cfg(feature = "opus")]
pub mod opus;

use crate::error::Result;
use crate::Sample;

pub use g711::{G711CodecFactory, G711Variant};
#[cfg(feature = "opus")]
pub use self::opus::OpusCodecFactory;

/// Upper bound on one encoded frame
pub const MAX_PACKET_BYTES: usize = 1500;

/// Largest frame any codec may decode into (120 ms at 48 kHz)
pub const MAX_FRAME_SAMPLES: usize = 5760;

/// Samples in one frame of `frame_ms` milliseconds at `sample_rate`
pub fn frame_size(sample_rate: u32, frame_ms: u32) -> usize {
    sample_rate as usize * frame_ms as usize / 1000
}

/// What a codec advertises in the session description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Encoding name as used in `a=rtpmap`
    pub name: String,
    /// Payload type offered for this codec
    pub payload_type: u8,
    /// RTP clock rate
    pub clock_rate: u32,
    /// Channel count advertised in `a=rtpmap`
    pub channels: u8,
    /// PCM samples consumed per encoded frame
    pub frame_samples: usize,
}

impl CodecDescriptor {
    /// The `<encoding>/<clock rate>[/<channels>]` part of an rtpmap line
    pub fn rtpmap(&self) -> String {
        if self.channels > 1 {
            format!("{}/{}/{}", self.name, self.clock_rate, self.channels)
        } else {
            format!("{}/{}", self.name, self.clock_rate)
        }
    }

    /// Whether an rtpmap entry names this codec
    pub fn matches(&self, name: &str, clock_rate: u32) -> bool {
        self.name.eq_ignore_ascii_case(name) && self.clock_rate == clock_rate
    }

    /// The same codec under a different payload type
    pub fn with_payload_type(&self, payload_type: u8) -> Self {
        Self {
            payload_type,
            ..self.clone()
        }
    }
}

/// Encodes one PCM frame
pub trait AudioEncoder: Send {
    /// Encode `pcm` into `out`, returning the number of bytes written
    fn encode(&mut self, pcm: &[Sample], out: &mut [u8]) -> Result<usize>;
}

/// Decodes one encoded frame
pub trait AudioDecoder: Send {
    /// Decode `payload` into `pcm`, returning the number of samples written
    fn decode(&mut self, payload: &[u8], pcm: &mut [Sample]) -> Result<usize>;
}

/// Builds encoder/decoder pairs for one codec
pub trait CodecFactory: Send + Sync {
    fn descriptor(&self) -> &CodecDescriptor;

    fn new_encoder(&self) -> Result<Box<dyn AudioEncoder>>;

    fn new_decoder(&self) -> Result<Box<dyn AudioDecoder>>;
}
