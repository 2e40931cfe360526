//! Recursive comb filter used as a spectral enhancer

use super::Stage;

/// `y[i] = x[i] * (1 - mix) + (x[i] + y[i - delay] * feedback) * mix`
///
/// The first `delay` samples pass through. The filter reads its own output,
/// so it must run strictly front to back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombEnhancer {
    pub delay: usize,
    pub feedback: f64,
    pub mix: f64,
}

impl Default for CombEnhancer {
    fn default() -> Self {
        Self {
            delay: 15,
            feedback: 0.2,
            mix: 0.3,
        }
    }
}

impl Stage for CombEnhancer {
    fn name(&self) -> &'static str {
        "spectral-enhancement"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(input.len());
        for (i, &sample) in input.iter().enumerate() {
            if i < self.delay {
                output.push(sample);
                continue;
            }
            let delayed = output[i - self.delay] as f64;
            let enhanced = sample as f64 + delayed * self.feedback;
            output.push((sample as f64 * (1.0 - self.mix) + enhanced * self.mix) as f32);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_passes_through() {
        let input: Vec<f32> = (0..15).map(|i| i as f32 / 15.0).collect();
        assert_eq!(CombEnhancer::default().process(&input), input);
    }

    #[test]
    fn test_impulse_response_recurses_on_output() {
        let mut input = vec![0.0f32; 46];
        input[0] = 1.0;
        let output = CombEnhancer::default().process(&input);

        // y[15] = 0.3 * 0.2 * y[0]; y[30] = 0.06 * y[15]; y[45] = 0.06 * y[30]
        assert!((output[15] - 0.06).abs() < 1e-7);
        assert!((output[30] - 0.0036).abs() < 1e-7);
        assert!((output[45] - 0.000216).abs() < 1e-7);
        assert_eq!(output[16], 0.0);
    }

    #[test]
    fn test_dc_gain() {
        // Steady state of y = 0.7x + 0.3(x + 0.2y) is x / 0.94
        let output = CombEnhancer::default().process(&[0.5; 600]);
        assert!((output[599] - 0.5 / 0.94).abs() < 1e-5);
    }
}
