//! Tick-based timing for sample-accurate playback scheduling
//!
//! Playback-clock instants are carried internally as `i64` ticks at
//! 28,224,000 Hz. The tick rate divides evenly into every common audio sample
//! rate (8kHz to 192kHz), so a delivery window boundary computed from a sample
//! count lands on an exact tick, and two timestamps that fall on the same
//! sample compare equal.
//!
//! Two time representations are in use:
//!
//! 1. **Seconds (API)**: `f64` values, as reported by audio hardware and as
//!    supplied by callers scheduling track callbacks
//! 2. **Ticks (Internal)**: `i64` values used as ordered map keys
//!
//! # Examples
//!
//! ```rust
//! use voxpush_common::timing::*;
//!
//! assert_eq!(seconds_to_ticks(1.0), TICK_RATE);
//!
//! // One 4096-sample buffer at 22.05kHz is exactly 1280 ticks per sample
//! assert_eq!(seconds_to_ticks(samples_to_seconds(4096, 22050)), 4096 * 1280);
//! ```

/// Tick rate: 28,224,000 Hz
///
/// LCM of the common audio sample rates (8kHz to 192kHz).
pub const TICK_RATE: i64 = 28_224_000;

/// Convert seconds to ticks, rounding to the nearest tick
///
/// Non-finite input maps to 0 (NaN) or saturates (±infinity).
///
/// ```rust
/// use voxpush_common::timing::seconds_to_ticks;
///
/// assert_eq!(seconds_to_ticks(0.0), 0);
/// assert_eq!(seconds_to_ticks(0.5), 14_112_000);
/// assert_eq!(seconds_to_ticks(-1.0), -28_224_000);
/// ```
pub fn seconds_to_ticks(seconds: f64) -> i64 {
    // `as` saturates on overflow and maps NaN to 0
    (seconds * TICK_RATE as f64).round() as i64
}

/// Duration in seconds of `samples` at `sample_rate`
///
/// # Panics
///
/// Panics if `sample_rate` is 0
///
/// ```rust
/// use voxpush_common::timing::samples_to_seconds;
///
/// assert_eq!(samples_to_seconds(11025, 22050), 0.5);
/// ```
pub fn samples_to_seconds(samples: usize, sample_rate: u32) -> f64 {
    assert!(sample_rate > 0, "sample_rate must be > 0");
    samples as f64 / sample_rate as f64
}
