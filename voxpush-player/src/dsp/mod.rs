//! Batch signal processing for finished utterances
//!
//! Every stage maps one buffer to a new buffer of the same length. Stage state
//! (envelopes, counters, feedback) lives only for the duration of one
//! `process` call, so stages are plain parameter structs that can be shared
//! between threads and reused across utterances.
//!
//! Arithmetic runs in `f64` and each output sample is stored as `f32`.

pub mod comb;
pub mod compressor;
pub mod de_esser;
pub mod limiter;
pub mod noise_gate;
pub mod normalizer;
pub mod pipeline;
pub mod pre_emphasis;
pub mod reverb;
pub mod window;

pub use comb::CombEnhancer;
pub use compressor::Compressor;
pub use de_esser::DeEsser;
pub use limiter::Limiter;
pub use noise_gate::NoiseGate;
pub use normalizer::Normalizer;
pub use pipeline::{merge_chunks, EnhancementPipeline, PipelineParams};
pub use pre_emphasis::PreEmphasis;
pub use reverb::Reverb;

/// One buffer-to-buffer transform
pub trait Stage: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Produce a new buffer of `input.len()` samples
    fn process(&self, input: &[f32]) -> Vec<f32>;
}
