//! Percentile-based loudness normalization

use super::Stage;
use crate::audio::types::peak;

/// Scales the buffer so the 90th-percentile block peak lands on
/// `target_peak`, times `volume`
///
/// Blocks whose peak is below `silence_floor` are ignored. If every block is
/// silent the input is returned unchanged. No clipping happens here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    pub volume: f64,
    pub block_size: usize,
    pub silence_floor: f32,
    pub target_peak: f64,
    pub percentile: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_volume(1.0)
    }
}

impl Normalizer {
    pub fn with_volume(volume: f64) -> Self {
        Self {
            volume,
            block_size: 512,
            silence_floor: 0.01,
            target_peak: 0.75,
            percentile: 0.9,
        }
    }

    /// Reference peak the gain is computed from, if any block is audible
    pub fn reference_peak(&self, input: &[f32]) -> Option<f32> {
        let mut peaks: Vec<f32> = input
            .chunks(self.block_size.max(1))
            .map(peak)
            .filter(|&p| p > self.silence_floor)
            .collect();

        if peaks.is_empty() {
            return None;
        }

        peaks.sort_by(f32::total_cmp);
        let index = ((peaks.len() as f64 * self.percentile).floor() as usize).min(peaks.len() - 1);
        Some(peaks[index])
    }

    /// Gain applied to every sample, or `None` for an all-silent buffer
    pub fn gain(&self, input: &[f32]) -> Option<f64> {
        self.reference_peak(input)
            .map(|reference| (self.target_peak / reference as f64) * self.volume)
    }
}

impl Stage for Normalizer {
    fn name(&self) -> &'static str {
        "normalization"
    }

    fn process(&self, input: &[f32]) -> Vec<f32> {
        match self.gain(input) {
            Some(gain) => input
                .iter()
                .map(|&sample| (sample as f64 * gain) as f32)
                .collect(),
            None => input.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_returned_unchanged() {
        let input = vec![0.005f32; 2048];
        assert_eq!(Normalizer::default().process(&input), input);
    }

    #[test]
    fn test_ninetieth_percentile_block() {
        // Ten audible blocks with peaks 0.1..=1.0; floor(10 * 0.9) = 9 -> 1.0
        let mut input = Vec::new();
        for step in 1..=10 {
            let mut block = vec![0.0f32; 512];
            block[0] = step as f32 / 10.0;
            input.extend(block);
        }
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.reference_peak(&input), Some(1.0));

        let output = normalizer.process(&input);
        assert!((output[9 * 512] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_silent_blocks_ignored() {
        let mut input = vec![0.0f32; 512 * 4];
        input[0] = 0.5;
        let output = Normalizer::default().process(&input);
        assert!((output[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_partial_last_block_counts() {
        let input = vec![0.2f32; 600];
        assert_eq!(Normalizer::default().reference_peak(&input), Some(0.2));
    }

    #[test]
    fn test_volume_scales_linearly() {
        let input: Vec<f32> = (0..2048).map(|i| ((i as f32) * 0.05).sin() * 0.3).collect();
        let single = Normalizer::with_volume(0.5).process(&input);
        let double = Normalizer::with_volume(1.0).process(&input);
        for (a, b) in single.iter().zip(double.iter()) {
            assert!((b - 2.0 * a).abs() < 1e-6);
        }
    }
}
