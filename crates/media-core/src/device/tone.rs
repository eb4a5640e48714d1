//! A software device that plays a sine tone into the capture ring and
//! drains the playback ring, paced in real time on its own thread.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{AudioDevice, DeviceEndpoint};
use crate::error::{Error, Result};
use crate::Sample;

/// Counters published by a running [`ToneDevice`]
#[derive(Debug, Default)]
pub struct ToneStats {
    captured: AtomicU64,
    played: AtomicU64,
    audible: AtomicU64,
}

impl ToneStats {
    /// Samples handed to the capture ring
    pub fn captured_samples(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }

    /// Samples pulled for playback, silence included
    pub fn played_samples(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }

    /// Played samples that were not silence
    pub fn audible_samples(&self) -> u64 {
        self.audible.load(Ordering::Relaxed)
    }
}

pub struct ToneDevice {
    name: String,
    sample_rate: u32,
    frame_samples: usize,
    frequency: f32,
    amplitude: f32,
    stats: Arc<ToneStats>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ToneDevice {
    pub fn new(sample_rate: u32, frame_samples: usize) -> Self {
        Self {
            name: "tone".to_string(),
            sample_rate,
            frame_samples,
            frequency: 440.0,
            amplitude: 0.25,
            stats: Arc::new(ToneStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Fraction of full scale, clamped to `[0, 1]`. Zero captures silence.
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    pub fn stats(&self) -> Arc<ToneStats> {
        self.stats.clone()
    }
}

impl AudioDevice for ToneDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, mut endpoint: DeviceEndpoint) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(Error::InvalidState("tone device already running".to_string()));
        }

        let frame_samples = self.frame_samples;
        let period = Duration::from_micros(frame_samples as u64 * 1_000_000 / self.sample_rate as u64);
        let step = 2.0 * PI * self.frequency / self.sample_rate as f32;
        let amplitude = self.amplitude * i16::MAX as f32;
        let running = self.running.clone();
        let stats = self.stats.clone();

        let worker = thread::Builder::new()
            .name("voxcall-tone".to_string())
            .spawn(move || {
                let mut input = vec![0 as Sample; frame_samples];
                let mut output = vec![0 as Sample; frame_samples];
                let mut phase = 0.0f32;
                let mut deadline = Instant::now();

                while running.load(Ordering::Acquire) {
                    for sample in input.iter_mut() {
                        *sample = (phase.sin() * amplitude) as Sample;
                        phase = (phase + step) % (2.0 * PI);
                    }

                    endpoint.process(&input, &mut output);

                    stats.captured.fetch_add(frame_samples as u64, Ordering::Relaxed);
                    stats.played.fetch_add(frame_samples as u64, Ordering::Relaxed);
                    let audible = output.iter().filter(|s| **s != 0).count();
                    stats.audible.fetch_add(audible as u64, Ordering::Relaxed);

                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        deadline = now;
                    }
                }
                debug!("Tone device callback thread exiting");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                Error::Device(format!("Failed to spawn tone thread: {}", e))
            })?;

        self.worker = Some(worker);
        info!("Started tone device at {} Hz, {} samples per frame", self.sample_rate, frame_samples);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Tone device thread panicked");
                return Err(Error::Device("tone thread panicked".to_string()));
            }
            info!("Stopped tone device");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for ToneDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
