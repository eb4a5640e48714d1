//! Opus codec over libopus
//!
//! Encodes mono voice at 48 kHz with the VoIP application profile. The
//! session description advertises `opus/48000/2` as RFC 7587 requires
//! regardless of the encoded channel count.

use opus::{Application, Channels, Decoder, Encoder};

use super::{AudioDecoder, AudioEncoder, CodecDescriptor, CodecFactory};
use crate::error::{Error, Result};
use crate::Sample;

const OPUS_SAMPLE_RATE: u32 = 48000;

/// Builds Opus encoders and decoders
#[derive(Debug, Clone)]
pub struct OpusCodecFactory {
    descriptor: CodecDescriptor,
}

impl OpusCodecFactory {
    pub fn new(payload_type: u8, frame_ms: u32) -> Self {
        Self {
            descriptor: CodecDescriptor {
                name: "opus".to_string(),
                payload_type,
                clock_rate: OPUS_SAMPLE_RATE,
                channels: 2,
                frame_samples: super::frame_size(OPUS_SAMPLE_RATE, frame_ms),
            },
        }
    }
}

impl Default for OpusCodecFactory {
    fn default() -> Self {
        Self::new(116, 20)
    }
}

impl CodecFactory for OpusCodecFactory {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    fn new_encoder(&self) -> Result<Box<dyn AudioEncoder>> {
        let encoder = Encoder::new(OPUS_SAMPLE_RATE, Channels::Mono, Application::Voip)
            .map_err(|e| Error::Codec(format!("Failed to create Opus encoder: {}", e)))?;
        Ok(Box::new(OpusEncoder { encoder }))
    }

    fn new_decoder(&self) -> Result<Box<dyn AudioDecoder>> {
        let decoder = Decoder::new(OPUS_SAMPLE_RATE, Channels::Mono)
            .map_err(|e| Error::Codec(format!("Failed to create Opus decoder: {}", e)))?;
        Ok(Box::new(OpusDecoder { decoder }))
    }
}

struct OpusEncoder {
    encoder: Encoder,
}

impl AudioEncoder for OpusEncoder {
    fn encode(&mut self, pcm: &[Sample], out: &mut [u8]) -> Result<usize> {
        self.encoder
            .encode(pcm, out)
            .map_err(|e| Error::Codec(format!("Opus encode failed: {}", e)))
    }
}

struct OpusDecoder {
    decoder: Decoder,
}

impl AudioDecoder for OpusDecoder {
    fn decode(&mut self, payload: &[u8], pcm: &mut [Sample]) -> Result<usize> {
        self.decoder
            .decode(payload, pcm, false)
            .map_err(|e| Error::Codec(format!("Opus decode failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MAX_FRAME_SAMPLES, MAX_PACKET_BYTES};

    #[test]
    fn test_opus_frame() {
        let factory = OpusCodecFactory::default();
        assert_eq!(factory.descriptor().rtpmap(), "opus/48000/2");
        assert_eq!(factory.descriptor().frame_samples, 960);

        let mut encoder = factory.new_encoder().unwrap();
        let mut decoder = factory.new_decoder().unwrap();

        let pcm = vec![0 as Sample; 960];
        let mut packet = [0u8; MAX_PACKET_BYTES];
        let len = encoder.encode(&pcm, &mut packet).unwrap();
        assert!(len > 0 && len <= MAX_PACKET_BYTES);

        let mut out = vec![0 as Sample; MAX_FRAME_SAMPLES];
        assert_eq!(decoder.decode(&packet[..len], &mut out).unwrap(), 960);
    }
}
