//! Deterministic test signals

use std::f32::consts::PI;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

/// `len` distinct, easily traceable samples: `start + i * 1e-4`
pub fn numbered(start: f32, len: usize) -> Vec<f32> {
    (0..len).map(|i| start + i as f32 * 1e-4).collect()
}

pub fn sine(frequency_hz: f32, amplitude: f32, len: usize, sample_rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * frequency_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Voiced bursts separated by near-silent gaps with a low noise floor
///
/// 200ms bursts of a 180Hz tone with a harmonic, 100ms gaps, noise at 0.005.
pub fn speech_like(len: usize, sample_rate: u32) -> Vec<f32> {
    let burst = (sample_rate as usize) / 5;
    let gap = (sample_rate as usize) / 10;
    let period = burst + gap;

    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            // Cheap deterministic noise
            let noise = 0.005 * ((i as f32 * 12.9898).sin() * 43758.547).fract();
            if i % period < burst {
                0.4 * (2.0 * PI * 180.0 * t).sin() + 0.15 * (2.0 * PI * 2400.0 * t).sin() + noise
            } else {
                noise
            }
        })
        .collect()
}

/// Write mono 16-bit PCM, the format an engine would record
pub fn write_wav_fixture<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()
}
