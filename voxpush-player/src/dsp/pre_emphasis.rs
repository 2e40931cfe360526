//! First-order pre-emphasis with peak renormalization

use super::Stage;
use crate::audio::types::peak;

/// `y[i] = x[i] - alpha * x[i - 1]`, then scaled so the peak is `target_peak`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreEmphasis {
    pub alpha: f64,
    pub target_peak: f64,
}

impl Default for PreEmphasis {
    fn default() -> Self {
        Self {
            alpha: 0.95,
            target_peak: 0.8,
        }
    }
}

impl Stage for PreEmphasis {
    fn name(&self) -> &'static str {
        "pre-emphasis"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        let Some(&first) = input.first() else {
            return Vec::new();
        };

        let mut output = Vec::with_capacity(input.len());
        output.push(first);
        output.extend(
            input
                .windows(2)
                .map(|pair| (pair[1] as f64 - self.alpha * pair[0] as f64) as f32),
        );

        // A silent buffer stays silent
        let max = peak(&output);
        if max > 0.0 {
            let scale = self.target_peak / max as f64;
            for sample in output.iter_mut() {
                *sample = (*sample as f64 * scale) as f32;
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difference_and_peak_normalization() {
        let output = PreEmphasis::default().process(&[1.0, 1.0, 0.0]);
        // raw: [1.0, 0.05, -0.95] -> scaled by 0.8
        assert!((output[0] - 0.8).abs() < 1e-6);
        assert!((output[1] - 0.04).abs() < 1e-6);
        assert!((output[2] + 0.76).abs() < 1e-6);
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn test_silence_is_not_scaled() {
        assert_eq!(PreEmphasis::default().process(&[0.0; 16]), vec![0.0; 16]);
    }

    #[test]
    fn test_empty_and_single_sample() {
        assert!(PreEmphasis::default().process(&[]).is_empty());
        let single = PreEmphasis::default().process(&[-0.2]);
        assert!((single[0] + 0.8).abs() < 1e-6);
    }
}
