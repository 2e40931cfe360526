//! Test helpers for voxpush-player integration tests
//!
//! - signal: deterministic test signals and WAV fixtures
//! - harness: streaming sink wired to a manual driver and a capture destination

#![allow(dead_code)]

pub mod harness;
pub mod signal;

pub use harness::SinkHarness;
pub use signal::{numbered, sine, speech_like, write_wav_fixture};
