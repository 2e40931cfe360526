//! # voxpush Common Library
//!
//! Shared code for the voxpush speech playback crates:
//! - Error types
//! - Configuration loading (TOML bootstrap + compiled defaults)
//! - Synthesis hand-off types (chunk / end-of-utterance messages, events)
//! - Tick-based timing conversions

pub mod config;
pub mod error;
pub mod events;
pub mod timing;

pub use error::{Error, Result};
pub use events::{SynthesisEvent, SynthesisEventKind, SynthesisMessage};
