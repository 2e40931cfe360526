//! # voxpush Player Library
//!
//! Real-time delivery and batch post-processing of synthesized speech.
//!
//! **Real-time path:** synthesis chunks are pushed into a [`StreamingSink`],
//! which drains them one fixed-size block per delivery invocation, fires
//! timestamped track callbacks against the playback clock, and fans blocks
//! out to its destinations (audio device, WAV file, capture).
//!
//! **Batch path:** every chunk of an utterance is merged and run through the
//! [`EnhancementPipeline`] (pre-emphasis, noise gate, spectral enhancement,
//! de-esser, compression, normalization, limiting).
//!
//! The two paths share the chunk representation and nothing else.

pub mod audio;
pub mod dsp;
pub mod error;
pub mod playback;
pub mod synthesis;

pub use audio::{AudioBuffer, SampleChunk};
pub use dsp::{EnhancementPipeline, PipelineParams};
pub use error::{Error, Result};
pub use playback::{SinkState, StreamingSink};
pub use synthesis::{Speaker, SynthesisEngine, SynthesisWorker};
