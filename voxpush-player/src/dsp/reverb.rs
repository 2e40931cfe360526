//! Convolution reverb for a little room warmth on playback

use super::Stage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used when none is given, so repeated renders are identical
pub const DEFAULT_SEED: u64 = 0x766f_7870;

/// Dry/wet mix with a short decaying-noise impulse response
///
/// The impulse is `(r * 2 - 1) * (1 - i / n)^decay` for uniform `r`, scaled
/// to unit energy. Output keeps the input length; the tail past the last
/// input sample is cut.
#[derive(Debug, Clone, PartialEq)]
pub struct Reverb {
    pub dry: f64,
    pub wet: f64,
    impulse: Vec<f32>,
}

impl Reverb {
    /// 0.15 s impulse, decay 2, dry 0.9 / wet 0.1
    pub fn new(sample_rate: u32) -> Self {
        Self::with_params(sample_rate, 0.15, 2.0, DEFAULT_SEED)
    }

    pub fn with_params(sample_rate: u32, seconds: f64, decay: f64, seed: u64) -> Self {
        let length = (sample_rate as f64 * seconds).floor() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut impulse: Vec<f32> = (0..length)
            .map(|i| {
                let envelope = (1.0 - i as f64 / length as f64).powf(decay);
                ((rng.gen::<f64>() * 2.0 - 1.0) * envelope) as f32
            })
            .collect();

        let energy = impulse.iter().map(|s| (*s as f64).powi(2)).sum::<f64>().sqrt();
        if energy > 0.0 {
            for sample in impulse.iter_mut() {
                *sample = (*sample as f64 / energy) as f32;
            }
        }

        Self {
            dry: 0.9,
            wet: 0.1,
            impulse,
        }
    }

    pub fn impulse(&self) -> &[f32] {
        &self.impulse
    }
}

impl Stage for Reverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        (0..input.len())
            .map(|i| {
                let taps = self.impulse.len().min(i + 1);
                let wet: f64 = self.impulse[..taps]
                    .iter()
                    .enumerate()
                    .map(|(k, h)| *h as f64 * input[i - k] as f64)
                    .sum();
                (input[i] as f64 * self.dry + wet * self.wet) as f32
            })
            .collect()
    }
}
