//! Forward-looking peak detection

use std::collections::VecDeque;

/// Absolute peak of `input[i..min(i + window, len)]` for every `i`
///
/// Monotonic-deque sliding maximum: O(len) overall, and identical to
/// rescanning the window at every sample.
///
/// # Examples
/// ```
/// use voxpush_player::dsp::window::forward_peaks;
///
/// let peaks = forward_peaks(&[0.1, -0.5, 0.2, 0.0], 2);
/// assert_eq!(peaks, vec![0.5, 0.5, 0.2, 0.0]);
/// ```
pub fn forward_peaks(input: &[f32], window: usize) -> Vec<f32> {
    let len = input.len();
    let mut peaks = vec![0.0f32; len];
    if window == 0 {
        return peaks;
    }

    // Indices whose absolute values are strictly decreasing front to back
    let mut candidates: VecDeque<usize> = VecDeque::with_capacity(window.min(len));
    let mut next = 0;

    for (i, peak) in peaks.iter_mut().enumerate() {
        let end = (i + window).min(len);
        while next < end {
            let level = input[next].abs();
            while candidates
                .back()
                .is_some_and(|&back| input[back].abs() <= level)
            {
                candidates.pop_back();
            }
            candidates.push_back(next);
            next += 1;
        }
        while candidates.front().is_some_and(|&front| front < i) {
            candidates.pop_front();
        }
        *peak = candidates.front().map_or(0.0, |&front| input[front].abs());
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(input: &[f32], window: usize) -> Vec<f32> {
        (0..input.len())
            .map(|i| {
                input[i..(i + window).min(input.len())]
                    .iter()
                    .fold(0.0f32, |acc, s| acc.max(s.abs()))
            })
            .collect()
    }

    #[test]
    fn test_matches_rescan() {
        let input: Vec<f32> = (0..500)
            .map(|i| ((i * 37 % 101) as f32 / 50.0 - 1.0) * if i % 7 == 0 { 2.0 } else { 1.0 })
            .collect();
        for window in [1, 2, 32, 64, 499, 500, 1000] {
            assert_eq!(forward_peaks(&input, window), naive(&input, window), "window {}", window);
        }
    }

    #[test]
    fn test_tail_windows_shrink() {
        let peaks = forward_peaks(&[0.9, 0.1, 0.2], 64);
        assert_eq!(peaks, vec![0.9, 0.2, 0.2]);
    }

    #[test]
    fn test_empty_and_zero_window() {
        assert!(forward_peaks(&[], 8).is_empty());
        assert_eq!(forward_peaks(&[1.0, 1.0], 0), vec![0.0, 0.0]);
    }
}
