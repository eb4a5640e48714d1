//! Hardware audio through CPAL
//!
//! CPAL streams are not `Send`, so the streams live on a dedicated thread
//! that builds them, reports whether they started, and drops them when told
//! to stop.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tracing::{error, info, warn};

use super::{AudioDevice, DeviceEndpoint};
use crate::codec::MAX_FRAME_SAMPLES;
use crate::error::{Error, Result};
use crate::Sample;

/// Default host input and output at a fixed sample rate
pub struct CpalAudioDevice {
    name: String,
    sample_rate: u32,
    shutdown: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl CpalAudioDevice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            name: "cpal-default".to_string(),
            sample_rate,
            shutdown: None,
            worker: None,
        }
    }
}

fn to_sample(value: f32) -> Sample {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32) as Sample
}

fn to_f32(sample: Sample) -> f32 {
    sample as f32 / i16::MAX as f32
}

fn build_streams(sample_rate: u32, endpoint: DeviceEndpoint) -> std::result::Result<(Stream, Stream), String> {
    let host = cpal::default_host();
    let input = host
        .default_input_device()
        .ok_or_else(|| "no default input device".to_string())?;
    let output = host
        .default_output_device()
        .ok_or_else(|| "no default output device".to_string())?;

    let input_channels = input
        .default_input_config()
        .map_err(|e| format!("input config: {}", e))?
        .channels();
    let output_channels = output
        .default_output_config()
        .map_err(|e| format!("output config: {}", e))?
        .channels();

    let (mut sink, mut source) = endpoint.into_parts();

    // Scratch buffers sized up front so the callbacks never allocate
    let mut capture_scratch: Vec<Sample> = Vec::with_capacity(MAX_FRAME_SAMPLES * 4);
    let mut playback_scratch: Vec<Sample> = Vec::with_capacity(MAX_FRAME_SAMPLES * 4);

    let input_stream = input
        .build_input_stream(
            &StreamConfig {
                channels: input_channels,
                sample_rate: SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            },
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                capture_scratch.clear();
                // First channel only
                capture_scratch.extend(data.chunks(input_channels as usize).map(|frame| to_sample(frame[0])));
                sink.push(&capture_scratch);
            },
            |err| error!("Audio capture error: {}", err),
            None,
        )
        .map_err(|e| format!("failed to build input stream: {}", e))?;

    let output_stream = output
        .build_output_stream(
            &StreamConfig {
                channels: output_channels,
                sample_rate: SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            },
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / output_channels as usize;
                playback_scratch.resize(frames, 0);
                source.pull(&mut playback_scratch);
                for (frame, sample) in data.chunks_mut(output_channels as usize).zip(&playback_scratch) {
                    frame.fill(to_f32(*sample));
                }
            },
            |err| error!("Audio playback error: {}", err),
            None,
        )
        .map_err(|e| format!("failed to build output stream: {}", e))?;

    input_stream.play().map_err(|e| format!("failed to start input: {}", e))?;
    output_stream.play().map_err(|e| format!("failed to start output: {}", e))?;

    Ok((input_stream, output_stream))
}

impl AudioDevice for CpalAudioDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, endpoint: DeviceEndpoint) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::InvalidState("audio device already running".to_string()));
        }

        let sample_rate = self.sample_rate;
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("voxcall-cpal".to_string())
            .spawn(move || {
                let streams = match build_streams(sample_rate, endpoint) {
                    Ok(streams) => {
                        let _ = ready_tx.send(Ok(()));
                        streams
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Either an explicit stop or the device being dropped
                let _ = shutdown_rx.recv();
                drop(streams);
            })
            .map_err(|e| Error::Device(format!("Failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Started audio device {} at {} Hz", self.name, sample_rate);
                self.shutdown = Some(shutdown_tx);
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = worker.join();
                Err(Error::Device(message))
            }
            Err(_) => {
                let _ = worker.join();
                Err(Error::Device("audio thread exited during start".to_string()))
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Audio device thread panicked");
            }
            info!("Stopped audio device {}", self.name);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for CpalAudioDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
