//! Pending sample queue for the streaming sink
//!
//! Ordered FIFO of sample chunks with partial-consumption semantics. The front
//! chunk is tracked with a read offset, so consuming part of it is equivalent
//! to replacing it with its remaining suffix without reallocating.
//!
//! Invariant: `len()` always equals the sum of every queued chunk's remaining
//! length. Chunks leave the front only once fully consumed.

use crate::audio::SampleChunk;
use std::collections::VecDeque;

/// FIFO of undrained sample chunks
#[derive(Debug, Default)]
pub struct SampleQueue {
    chunks: VecDeque<SampleChunk>,

    /// Samples already consumed from the front chunk
    front_offset: usize,

    /// Total undrained samples across all chunks
    pending: usize,
}

impl SampleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk to the back of the queue
    ///
    /// Empty chunks carry no samples and are not stored.
    pub fn append(&mut self, chunk: SampleChunk) {
        if chunk.is_empty() {
            return;
        }
        self.pending += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Copy up to `out.len()` samples from the front into `out`, starting at 0
    ///
    /// Returns the number of samples written. When the queue runs dry the
    /// remainder of `out` is left untouched; the caller decides what silence
    /// looks like.
    pub fn drain_into(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;

        while written < out.len() {
            let Some(front) = self.chunks.front() else {
                break;
            };

            let remaining = &front.as_slice()[self.front_offset..];
            let to_copy = remaining.len().min(out.len() - written);
            out[written..written + to_copy].copy_from_slice(&remaining[..to_copy]);

            written += to_copy;
            self.front_offset += to_copy;

            if self.front_offset == front.len() {
                self.chunks.pop_front();
                self.front_offset = 0;
            }
        }

        self.pending -= written;
        written
    }

    /// Remove and return up to `n` samples from the front (never padded)
    pub fn drain_up_to(&mut self, n: usize) -> Vec<f32> {
        let mut out = vec![0.0; n.min(self.pending)];
        let written = self.drain_into(&mut out);
        debug_assert_eq!(written, out.len());
        out
    }

    /// O(1) emptiness check
    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Total undrained samples
    pub fn len(&self) -> usize {
        self.pending
    }

    /// Number of chunks still holding undrained samples
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Discard everything queued
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.front_offset = 0;
        self.pending = 0;
    }
}
