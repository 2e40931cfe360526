//! Look-ahead noise gate with hold and linear release

use super::window::forward_peaks;
use super::Stage;

/// Silences the signal unless a peak above `threshold` is coming within
/// `look_ahead` samples
///
/// Per sample, in priority order:
/// 1. look-ahead peak above threshold: open, re-arm hold and release, pass
/// 2. hold remaining: count down, pass while open
/// 3. release remaining: count down, fade by `release_left / release`
/// 4. otherwise: close and output silence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseGate {
    pub threshold: f32,
    pub look_ahead: usize,
    pub hold: u32,
    pub release: u32,
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            look_ahead: 64,
            hold: 32,
            release: 128,
        }
    }
}

impl Stage for NoiseGate {
    fn name(&self) -> &'static str {
        "noise-gate"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        let peaks = forward_peaks(input, self.look_ahead);
        let mut output = vec![0.0f32; input.len()];

        let mut open = false;
        let mut hold_left = 0u32;
        let mut release_left = 0u32;

        for (i, (&sample, &future_peak)) in input.iter().zip(peaks.iter()).enumerate() {
            if future_peak > self.threshold {
                open = true;
                hold_left = self.hold;
                release_left = self.release;
            } else if hold_left > 0 {
                hold_left -= 1;
            } else if release_left > 0 {
                release_left -= 1;
                let gain = release_left as f64 / self.release as f64;
                output[i] = (sample as f64 * gain) as f32;
                continue;
            } else {
                open = false;
            }

            output[i] = if open { sample } else { 0.0 };
        }

        output
    }
}
