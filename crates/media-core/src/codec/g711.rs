//! G.711 codec implementation
//!
//! G.711 companding maps each 16-bit PCM sample to one byte:
//! - μ-law (PCMU, payload type 0)
//! - A-law (PCMA, payload type 8)
//!
//! Always 8 kHz mono; a 20 ms frame is 160 samples and 160 bytes.

use super::{AudioDecoder, AudioEncoder, CodecDescriptor, CodecFactory};
use crate::error::{Error, Result};
use crate::Sample;

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 32635;

/// G.711 codec variant (μ-law or A-law)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum G711Variant {
    /// μ-law (PCMU, payload type 0)
    Pcmu,
    /// A-law (PCMA, payload type 8)
    Pcma,
}

impl G711Variant {
    fn name(self) -> &'static str {
        match self {
            G711Variant::Pcmu => "PCMU",
            G711Variant::Pcma => "PCMA",
        }
    }

    fn payload_type(self) -> u8 {
        match self {
            G711Variant::Pcmu => 0,
            G711Variant::Pcma => 8,
        }
    }

    fn compress(self, sample: Sample) -> u8 {
        match self {
            G711Variant::Pcmu => linear_to_ulaw(sample),
            G711Variant::Pcma => linear_to_alaw(sample),
        }
    }

    fn expand(self, byte: u8) -> Sample {
        match self {
            G711Variant::Pcmu => ulaw_to_linear(byte),
            G711Variant::Pcma => alaw_to_linear(byte),
        }
    }
}

/// Builds G.711 encoders and decoders
#[derive(Debug, Clone)]
pub struct G711CodecFactory {
    variant: G711Variant,
    descriptor: CodecDescriptor,
}

impl G711CodecFactory {
    /// `frame_ms` of audio per packet at 8 kHz
    pub fn new(variant: G711Variant, frame_ms: u32) -> Self {
        Self {
            variant,
            descriptor: CodecDescriptor {
                name: variant.name().to_string(),
                payload_type: variant.payload_type(),
                clock_rate: 8000,
                channels: 1,
                frame_samples: super::frame_size(8000, frame_ms),
            },
        }
    }

    pub fn pcmu() -> Self {
        Self::new(G711Variant::Pcmu, 20)
    }

    pub fn pcma() -> Self {
        Self::new(G711Variant::Pcma, 20)
    }
}

impl CodecFactory for G711CodecFactory {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn new_encoder(&self) -> Result<Box<dyn AudioEncoder>> {
        Ok(Box::new(G711Codec { variant: self.variant }))
    }

    fn new_decoder(&self) -> Result<Box<dyn AudioDecoder>> {
        Ok(Box::new(G711Codec { variant: self.variant }))
    }
}

/// Stateless G.711 transcoder
#[derive(Debug, Clone, Copy)]
pub struct G711Codec {
    variant: G711Variant,
}

impl AudioEncoder for G711Codec {
    fn encode(&mut self, pcm: &[Sample], out: &mut [u8]) -> Result<usize> {
        if out.len() < pcm.len() {
            return Err(Error::Codec(format!(
                "G.711 output buffer of {} bytes cannot hold {} samples",
                out.len(),
                pcm.len()
            )));
        }
        for (dst, sample) in out.iter_mut().zip(pcm) {
            *dst = self.variant.compress(*sample);
        }
        Ok(pcm.len())
    }
}

impl AudioDecoder for G711Codec {
    fn decode(&mut self, payload: &[u8], pcm: &mut [Sample]) -> Result<usize> {
        if pcm.len() < payload.len() {
            return Err(Error::Codec(format!(
                "G.711 payload of {} bytes does not fit a {}-sample frame",
                payload.len(),
                pcm.len()
            )));
        }
        for (dst, byte) in pcm.iter_mut().zip(payload) {
            *dst = self.variant.expand(*byte);
        }
        Ok(payload.len())
    }
}

fn linear_to_ulaw(sample: Sample) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };

    let pcm = pcm.min(ULAW_CLIP) + ULAW_BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && pcm & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = (pcm >> (exponent + 3)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}

fn ulaw_to_linear(byte: u8) -> Sample {
    let byte = !byte;
    let exponent = ((byte >> 4) & 0x07) as i32;
    let mantissa = (byte & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + ULAW_BIAS) << exponent) - ULAW_BIAS;
    if byte & 0x80 != 0 {
        -magnitude as Sample
    } else {
        magnitude as Sample
    }
}

fn linear_to_alaw(sample: Sample) -> u8 {
    // 13 most significant bits, one's complement for negatives
    let mut ix = if sample < 0 {
        ((!sample) >> 4) as i32
    } else {
        (sample >> 4) as i32
    };

    if ix > 15 {
        let mut exponent = 1;
        while ix > 16 + 15 {
            ix >>= 1;
            exponent += 1;
        }
        ix -= 16;
        ix += exponent << 4;
    }

    if sample >= 0 {
        ix |= 0x80;
    }

    (ix ^ 0x55) as u8
}

fn alaw_to_linear(byte: u8) -> Sample {
    let ix = ((byte ^ 0x55) & 0x7F) as i32;
    let exponent = ix >> 4;
    let mut mantissa = ix & 0x0F;

    if exponent > 0 {
        mantissa += 16;
    }
    mantissa = (mantissa << 4) + 0x08;
    if exponent > 1 {
        mantissa <<= exponent - 1;
    }

    if byte > 0x7F {
        mantissa as Sample
    } else {
        -mantissa as Sample
    }
}
