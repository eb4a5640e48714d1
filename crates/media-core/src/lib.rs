//! Media core for voxcall
//!
//! Everything between the audio hardware and the RTP payload:
//!
//! - `buffer`: the lock-free single-producer/single-consumer [`AudioRing`]
//! - `codec`: fixed-frame encoder/decoder traits and the built-in codecs
//! - `device`: the audio device trait, the real-time callback endpoint and
//!   input/output level metering

pub mod buffer;
pub mod codec;
pub mod device;
pub mod error;

pub use buffer::{AudioRing, RingConsumer, RingProducer};
pub use codec::{
    AudioDecoder, AudioEncoder, CodecDescriptor, CodecFactory, G711CodecFactory, G711Variant, MAX_FRAME_SAMPLES,
    MAX_PACKET_BYTES, frame_size,
};
pub use device::{
    AudioDevice, AudioStream, CaptureReader, CaptureSink, DeviceEndpoint, LevelMeter, PlaybackSource,
    PlaybackWriter, ToneDevice, ToneStats,
};
#[cfg(feature = "opus")]
pub use codec::OpusCodecFactory;
#[cfg(feature = "device-cpal")]
pub use device::CpalAudioDevice;
pub use error::{Error, Result};

/// One 16-bit PCM audio sample
pub type Sample = i16;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        AudioDecoder, AudioDevice, AudioEncoder, AudioRing, AudioStream, CaptureReader,
        CodecDescriptor, CodecFactory, DeviceEndpoint, Error, LevelMeter, PlaybackWriter, Result,
        Sample,
    };
}
