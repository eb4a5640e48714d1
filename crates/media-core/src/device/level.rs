use std::sync::atomic::{AtomicU32, Ordering};

use crate::Sample;

const LEVEL_SCALE: f32 = 10000.0;
const FLOOR_DB: f32 = 20.0;
const CEILING_DB: f32 = 200.0;

/// Input and output audio levels, written from the device callback and read
/// from anywhere.
///
/// Levels are in `[0.0, 1.0]` where 0 is silence.
#[derive(Debug, Default)]
pub struct LevelMeter {
    input: AtomicU32,
    output: AtomicU32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_input(&self, samples: &[Sample]) {
        if let Some(level) = measure(samples) {
            self.input.store(level, Ordering::Relaxed);
        }
    }

    pub fn update_output(&self, samples: &[Sample]) {
        if let Some(level) = measure(samples) {
            self.output.store(level, Ordering::Relaxed);
        }
    }

    pub fn input_level(&self) -> f32 {
        self.input.load(Ordering::Relaxed) as f32 / LEVEL_SCALE
    }

    pub fn output_level(&self) -> f32 {
        self.output.load(Ordering::Relaxed) as f32 / LEVEL_SCALE
    }

    pub fn reset(&self) {
        self.input.store(0, Ordering::Relaxed);
        self.output.store(0, Ordering::Relaxed);
    }
}

/// Mean absolute amplitude mapped onto a -200..-20 dB scale
fn measure(samples: &[Sample]) -> Option<u32> {
    if samples.is_empty() {
        return None;
    }

    let sum: f32 = samples
        .iter()
        .map(|s| (*s as f32 / i16::MAX as f32).abs())
        .sum();
    let mean = sum / samples.len() as f32;

    // ln(0) is -inf, which clamps to the ceiling and reads as silence
    let attenuation = (-20.0 * mean.ln()).clamp(FLOOR_DB, CEILING_DB);
    let level = 1.0 - (attenuation - FLOOR_DB) / (CEILING_DB - FLOOR_DB);

    Some((level * LEVEL_SCALE) as u32)
}
