//! Envelope-following downward compressor with fixed makeup gain

use super::Stage;

/// Single-pole envelope follower driving a static gain curve
///
/// `rate = attack` while the level rises above the envelope, `release`
/// otherwise; above `threshold` the excess is divided by `ratio`. Every
/// sample is then multiplied by `makeup_gain`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compressor {
    pub threshold: f64,
    pub ratio: f64,
    pub attack: f64,
    pub release: f64,
    pub makeup_gain: f64,
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            ratio: 2.5,
            attack: 0.002,
            release: 0.05,
            makeup_gain: 1.2,
        }
    }
}

impl Compressor {
    fn gain_for(&self, envelope: f64) -> f64 {
        if envelope > self.threshold {
            (self.threshold + (envelope - self.threshold) / self.ratio) / envelope
        } else {
            1.0
        }
    }
}

impl Stage for Compressor {
    fn name(&self) -> &'static str {
        "compression"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        let mut envelope = 0.0f64;
        input
            .iter()
            .map(|&sample| {
                let level = (sample as f64).abs();
                let rate = if level > envelope {
                    self.attack
                } else {
                    self.release
                };
                envelope += (level - envelope) * rate;
                (sample as f64 * self.gain_for(envelope) * self.makeup_gain) as f32
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_stay_zero() {
        assert_eq!(Compressor::default().process(&[0.0; 1024]), vec![0.0; 1024]);
    }

    #[test]
    fn test_below_threshold_only_makeup() {
        let output = Compressor::default().process(&[0.3, -0.3, 0.3]);
        for (out, expected) in output.iter().zip([0.36f32, -0.36, 0.36]) {
            assert!((out - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sustained_loud_signal_is_reduced() {
        let output = Compressor::default().process(&[0.9; 20_000]);
        let last = *output.last().unwrap() as f64;

        // Envelope converges to 0.9: gain = (0.5 + 0.4 / 2.5) / 0.9
        let expected = 0.9 * ((0.5 + 0.4 / 2.5) / 0.9) * 1.2;
        assert!((last - expected).abs() < 1e-3, "got {}", last);
        assert!(last < 0.9 * 1.2);
    }

    #[test]
    fn test_attack_is_slow() {
        // One loud sample barely moves the envelope
        let output = Compressor::default().process(&[1.0]);
        assert!((output[0] - 1.2).abs() < 1e-6);
    }
}
