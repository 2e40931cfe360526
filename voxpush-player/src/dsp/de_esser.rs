//! Sibilance reduction by averaging sharp sample-to-sample jumps

use super::Stage;

/// Where `|x[i] - x[i - 1]|` exceeds `threshold`, blend the sample with its
/// raw predecessor: `y[i] = x[i] * reduction + x[i - 1] * (1 - reduction)`
///
/// The predecessor is always the unprocessed input sample; `x[-1]` is 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeEsser {
    pub threshold: f64,
    pub reduction: f64,
}

impl Default for DeEsser {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            reduction: 0.5,
        }
    }
}

impl Stage for DeEsser {
    fn name(&self) -> &'static str {
        "de-esser"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        let mut previous = 0.0f64;
        input
            .iter()
            .map(|&sample| {
                let current = sample as f64;
                let energy = (current - previous).abs();
                let out = if energy > self.threshold {
                    (current * self.reduction + previous * (1.0 - self.reduction)) as f32
                } else {
                    sample
                };
                previous = current;
                out
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smooth_signal_untouched() {
        let input = [0.0, 0.1, 0.2, 0.3, 0.2, 0.1];
        assert_eq!(DeEsser::default().process(&input), input.to_vec());
    }

    #[test]
    fn test_jumps_use_raw_predecessor() {
        // 0.0 -> 0.8 jumps, 0.8 -> -0.2 jumps again; both use the raw input
        let output = DeEsser::default().process(&[0.0, 0.8, -0.2, -0.1]);
        assert!((output[1] - 0.4).abs() < 1e-6);
        assert!((output[2] - 0.3).abs() < 1e-6);
        assert!((output[3] + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_first_sample_compared_to_zero() {
        let output = DeEsser::default().process(&[0.9]);
        assert!((output[0] - 0.45).abs() < 1e-6);
    }
}
