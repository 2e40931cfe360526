//! Fixed-order enhancement pipeline for finished utterances
//!
//! With `enhance` on: pre-emphasis, noise gate, spectral enhancement,
//! de-esser. Always: compression, normalization (volume), limiting.

use super::{
    CombEnhancer, Compressor, DeEsser, Limiter, NoiseGate, Normalizer, PreEmphasis, Stage,
};
use crate::audio::{AudioBuffer, SampleChunk};
use std::time::Instant;
use tracing::debug;
use voxpush_common::config::SpeakOptions;

/// Parameters the pipeline interprets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    /// Normalization gain multiplier
    pub volume: f32,

    /// Run the four enhancement stages
    pub enhance: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            enhance: true,
        }
    }
}

impl From<&SpeakOptions> for PipelineParams {
    fn from(options: &SpeakOptions) -> Self {
        Self {
            volume: options.volume,
            enhance: options.enhance,
        }
    }
}

/// Concatenate every chunk of one utterance, in arrival order
pub fn merge_chunks<I>(chunks: I, sample_rate: u32) -> AudioBuffer
where
    I: IntoIterator<Item = SampleChunk>,
{
    let buffer = AudioBuffer::from_chunks(chunks, sample_rate);
    debug!(
        "Merged utterance: {} samples ({:.2}s)",
        buffer.len(),
        buffer.duration_seconds()
    );
    buffer
}

pub struct EnhancementPipeline {
    params: PipelineParams,
    stages: Vec<Box<dyn Stage>>,
}

impl EnhancementPipeline {
    pub fn new(params: PipelineParams) -> Self {
        let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(7);
        if params.enhance {
            stages.push(Box::new(PreEmphasis::default()));
            stages.push(Box::new(NoiseGate::default()));
            stages.push(Box::new(CombEnhancer::default()));
            stages.push(Box::new(DeEsser::default()));
        }
        stages.push(Box::new(Compressor::default()));
        stages.push(Box::new(Normalizer::with_volume(params.volume as f64)));
        stages.push(Box::new(Limiter::default()));

        Self { params, stages }
    }

    pub fn params(&self) -> PipelineParams {
        self.params
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage over `input`, returning a buffer of the same length
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let total = Instant::now();
        let mut current = input.to_vec();

        for stage in &self.stages {
            let started = Instant::now();
            current = stage.process(&current);
            debug!("{} took {:?}", stage.name(), started.elapsed());
        }

        debug!(
            "Enhancement pipeline processed {} samples in {:?} (enhance: {}, volume: {})",
            input.len(),
            total.elapsed(),
            self.params.enhance,
            self.params.volume
        );
        current
    }

    pub fn process_buffer(&self, buffer: &AudioBuffer) -> AudioBuffer {
        buffer.with_samples(self.process(&buffer.samples))
    }

    /// Merge the chunks of one utterance and process the result
    pub fn process_chunks<I>(&self, chunks: I, sample_rate: u32) -> AudioBuffer
    where
        I: IntoIterator<Item = SampleChunk>,
    {
        let merged = merge_chunks(chunks, sample_rate);
        self.process_buffer(&merged)
    }
}

impl Default for EnhancementPipeline {
    fn default() -> Self {
        Self::new(PipelineParams::default())
    }
}

impl std::fmt::Debug for EnhancementPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementPipeline")
            .field("params", &self.params)
            .field("stages", &self.stage_names())
            .finish()
    }
}
