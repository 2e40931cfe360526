//! Look-ahead peak limiter with a final hard clip

use super::window::forward_peaks;
use super::Stage;

/// Scales each sample by `threshold / peak` when the peak of
/// `[i, i + look_ahead)` exceeds `threshold`, then clips to `±ceiling`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limiter {
    pub threshold: f32,
    pub look_ahead: usize,
    pub ceiling: f32,
}

impl Default for Limiter {
    fn default() -> Self {
        Self {
            threshold: 0.95,
            look_ahead: 32,
            ceiling: 0.99,
        }
    }
}

impl Stage for Limiter {
    fn name(&self) -> &'static str {
        "limiting"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        // The current sample is always inside its own window
        let peaks = forward_peaks(input, self.look_ahead.max(1));

        input
            .iter()
            .zip(peaks.iter())
            .map(|(&sample, &future_peak)| {
                let limited = if future_peak > self.threshold {
                    (sample as f64 * (self.threshold as f64 / future_peak as f64)) as f32
                } else {
                    sample
                };
                limited.clamp(-self.ceiling, self.ceiling)
            })
            .collect()
    }
}
