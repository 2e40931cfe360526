//! Core audio data types
//!
//! Defines the chunk and buffer structures shared by the real-time and batch
//! paths. All samples are mono f32, nominally in [-1.0, 1.0].

/// One discrete group of samples produced by a single synthesis callback.
///
/// Immutable once produced. The producer owns it until it is handed to a
/// `SampleQueue`, which then owns it until it is fully drained.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleChunk {
    samples: Box<[f32]>,
}

impl SampleChunk {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }
}

impl From<Vec<f32>> for SampleChunk {
    fn from(samples: Vec<f32>) -> Self {
        SampleChunk::new(samples)
    }
}

impl From<&[f32]> for SampleChunk {
    fn from(samples: &[f32]) -> Self {
        SampleChunk::new(samples.to_vec())
    }
}

/// A complete utterance held in memory for batch processing.
///
/// Fixed length and fixed sample rate. Each pipeline stage consumes one buffer
/// and produces a new buffer of identical length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Mono PCM samples
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Concatenate chunks in arrival order into one contiguous buffer
    pub fn from_chunks<I>(chunks: I, sample_rate: u32) -> Self
    where
        I: IntoIterator<Item = SampleChunk>,
    {
        let chunks: Vec<SampleChunk> = chunks.into_iter().collect();
        let total: usize = chunks.iter().map(SampleChunk::len).sum();

        let mut samples = Vec::with_capacity(total);
        for chunk in &chunks {
            samples.extend_from_slice(chunk.as_slice());
        }

        Self::new(samples, sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        voxpush_common::timing::samples_to_seconds(self.samples.len(), self.sample_rate)
    }

    /// Largest absolute sample value (0.0 for an empty buffer)
    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }

    /// Replace the samples, keeping the sample rate
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self::new(samples, self.sample_rate)
    }
}

/// Largest absolute value in `samples`
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
}
