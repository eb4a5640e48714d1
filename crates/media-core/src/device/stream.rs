//! The four ring endpoints that connect a device callback to the media
//! threads.
//!
//! ```text
//!   device callback                       media threads
//!   CaptureSink ----> capture ring ----> CaptureReader   (send loop)
//!   PlaybackSource <-- playback ring <-- PlaybackWriter  (receive path)
//! ```
//!
//! The callback side never blocks and never allocates.

use std::sync::Arc;

use tracing::debug;

use super::LevelMeter;
use crate::buffer::{AudioRing, RingConsumer, RingProducer};
use crate::error::{Error, Result};
use crate::Sample;

/// A freshly opened pair of capture and playback rings
pub struct AudioStream {
    pub endpoint: DeviceEndpoint,
    pub capture: CaptureReader,
    pub playback: PlaybackWriter,
}

impl AudioStream {
    /// Open both rings. A `capacity` of 0 sizes them for ten frames.
    pub fn open(frame_samples: usize, capacity: usize, meter: Arc<LevelMeter>) -> Result<Self> {
        if frame_samples == 0 {
            return Err(Error::InvalidConfig("frame size must be non-zero".to_string()));
        }

        let capacity = if capacity == 0 {
            AudioRing::capacity_for_frames(frame_samples)
        } else {
            capacity
        };
        if capacity < frame_samples {
            return Err(Error::InvalidConfig(format!(
                "ring capacity {} is smaller than one {}-sample frame",
                capacity, frame_samples
            )));
        }

        let (capture_tx, capture_rx) = AudioRing::new(capacity)?.split();
        let (playback_tx, playback_rx) = AudioRing::new(capacity)?.split();

        debug!("Opened audio stream: {} samples/frame, ring capacity {}", frame_samples, capacity);

        Ok(Self {
            endpoint: DeviceEndpoint {
                capture: CaptureSink {
                    ring: capture_tx,
                    meter: meter.clone(),
                },
                playback: PlaybackSource {
                    ring: playback_rx,
                    meter,
                },
            },
            capture: CaptureReader {
                ring: capture_rx,
                frame_samples,
            },
            playback: PlaybackWriter {
                ring: playback_tx,
                frame_samples,
            },
        })
    }
}

/// What a device callback holds
pub struct DeviceEndpoint {
    capture: CaptureSink,
    playback: PlaybackSource,
}

impl DeviceEndpoint {
    /// One duplex callback: push captured audio, fill `output` for playback
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) {
        self.capture.push(input);
        self.playback.pull(output);
    }

    /// For devices that run separate input and output callbacks
    pub fn into_parts(self) -> (CaptureSink, PlaybackSource) {
        (self.capture, self.playback)
    }
}

/// Producer half of the capture ring, fed by the device
pub struct CaptureSink {
    ring: RingProducer,
    meter: Arc<LevelMeter>,
}

impl CaptureSink {
    /// Queue captured samples. Returns how many fit; the rest are dropped.
    pub fn push(&mut self, input: &[Sample]) -> usize {
        self.meter.update_input(input);
        self.ring.write(input)
    }
}

/// Consumer half of the playback ring, drained by the device
pub struct PlaybackSource {
    ring: RingConsumer,
    meter: Arc<LevelMeter>,
}

impl PlaybackSource {
    /// Fill `output` with queued audio, or silence when a whole buffer is
    /// not yet available. Returns true if real audio was played.
    pub fn pull(&mut self, output: &mut [Sample]) -> bool {
        let played = if self.ring.read_available() >= output.len() {
            self.ring.read(output);
            true
        } else {
            output.fill(0);
            false
        };
        self.meter.update_output(output);
        played
    }
}

/// Send-loop side of the capture ring
pub struct CaptureReader {
    ring: RingConsumer,
    frame_samples: usize,
}

impl CaptureReader {
    /// Take exactly one frame, or nothing if a full frame is not queued
    pub fn read_frame(&mut self, frame: &mut [Sample]) -> usize {
        let wanted = frame.len().min(self.frame_samples);
        if self.ring.read_available() < wanted {
            return 0;
        }
        self.ring.read(&mut frame[..wanted])
    }

    pub fn has_frame(&self) -> bool {
        self.ring.read_available() >= self.frame_samples
    }

    pub fn read_available(&self) -> usize {
        self.ring.read_available()
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }
}

/// Receive-path side of the playback ring
pub struct PlaybackWriter {
    ring: RingProducer,
    frame_samples: usize,
}

impl PlaybackWriter {
    /// Queue decoded samples, returning how many fit
    pub fn write_frame(&mut self, frame: &[Sample]) -> usize {
        self.ring.write(frame)
    }

    pub fn write_available(&self) -> usize {
        self.ring.write_available()
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(frame: usize) -> (AudioStream, Arc<LevelMeter>) {
        let meter = Arc::new(LevelMeter::new());
        (AudioStream::open(frame, 0, meter.clone()).unwrap(), meter)
    }

    #[test]
    fn test_default_capacity() {
        let (stream, _) = open(960);
        assert_eq!(stream.playback.write_available(), 16384);
    }

    #[test]
    fn test_capture_waits_for_full_frame() {
        let (mut stream, _) = open(160);
        let mut out = [0i16; 160];

        stream.endpoint.process(&[7; 100], &mut [0; 100]);
        assert!(!stream.capture.has_frame());
        assert_eq!(stream.capture.read_frame(&mut [0; 160]), 0);

        stream.endpoint.process(&[7; 100], &mut [0; 100]);
        assert_eq!(stream.capture.read_frame(&mut out), 160);
        assert!(out.iter().all(|s| *s == 7));
        assert_eq!(stream.capture.read_available(), 40);
    }

    #[test]
    fn test_playback_underrun_plays_silence() {
        let (mut stream, meter) = open(160);
        stream.playback.write_frame(&[1000; 50]);

        let mut output = [123i16; 160];
        stream.endpoint.process(&[0; 160], &mut output);
        assert!(output.iter().all(|s| *s == 0));
        assert_eq!(meter.output_level(), 0.0);

        stream.playback.write_frame(&[1000; 160]);
        stream.endpoint.process(&[0; 160], &mut output);
        assert!(output.iter().all(|s| *s == 1000));
        assert!(meter.output_level() > 0.0);
    }

    #[test]
    fn test_capture_meters_input() {
        let (stream, meter) = open(160);
        let (mut sink, _) = stream.endpoint.into_parts();
        assert_eq!(sink.push(&[8000; 160]), 160);
        assert!(meter.input_level() > 0.0);
    }

    #[test]
    fn test_capacity_smaller_than_frame_is_rejected() {
        let meter = Arc::new(LevelMeter::new());
        assert!(AudioStream::open(960, 512, meter.clone()).is_err());
        assert!(AudioStream::open(0, 0, meter.clone()).is_err());
        assert!(matches!(
            AudioStream::open(160, 1000, meter),
            Err(Error::InvalidCapacity(1000))
        ));
    }
}
