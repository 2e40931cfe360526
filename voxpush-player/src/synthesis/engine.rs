//! Synthesis engine abstraction

use crate::error::Result;
use voxpush_common::SynthesisMessage;

/// Text-to-speech engine driven by a [`SynthesisWorker`](super::SynthesisWorker)
///
/// `voice`, `rate` and `pitch` are passed through exactly as configured; the
/// engine decides what they mean.
pub trait SynthesisEngine: Send {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    fn set_voice(&mut self, voice: &str) -> Result<()>;

    fn set_rate(&mut self, rate: u32) -> Result<()>;

    fn set_pitch(&mut self, pitch: u32) -> Result<()>;

    /// Synthesize `text`, reporting each chunk through `emit`
    ///
    /// The engine emits zero or more `Chunk` messages followed by exactly one
    /// `EndOfUtterance`. An engine that returns an error may stop early
    /// without the end marker.
    fn synthesize(&mut self, text: &str, emit: &mut dyn FnMut(SynthesisMessage)) -> Result<()>;
}
