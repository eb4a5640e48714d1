//! Audio devices
//!
//! A device owns the hardware (or a simulation of it) and drives a
//! [`DeviceEndpoint`] from its real-time callback.

#[cfg(feature = "device-cpal")]
pub mod cpal;
pub mod level;
pub mod stream;
pub mod tone;

pub use level::LevelMeter;
pub use stream::{AudioStream, CaptureReader, CaptureSink, DeviceEndpoint, PlaybackSource, PlaybackWriter};
pub use tone::{ToneDevice, ToneStats};

#[cfg(feature = "device-cpal")]
pub use self::cpal::CpalAudioDevice;

use crate::error::Result;

/// A full-duplex audio device
pub trait AudioDevice: Send {
    fn name(&self) -> &str;

    /// Start the callback. The device keeps `endpoint` until stopped.
    fn start(&mut self, endpoint: DeviceEndpoint) -> Result<()>;

    /// Stop the callback and release the endpoint. Stopping an idle device
    /// is a no-op.
    fn stop(&mut self) -> Result<()>;

    fn is_active(&self) -> bool;
}
