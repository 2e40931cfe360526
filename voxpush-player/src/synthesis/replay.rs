//! Engine that replays recorded audio as if it were being synthesized
//!
//! Used by the CLI to push a WAV file through the same producer boundary a
//! live engine would use, and by tests. Words of the input text are spread
//! evenly across the recording and reported as word events.

use super::engine::SynthesisEngine;
use crate::audio::AudioBuffer;
use crate::error::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;
use voxpush_common::timing::samples_to_seconds;
use voxpush_common::{SynthesisEvent, SynthesisEventKind, SynthesisMessage};

/// Voice parameters last forwarded to the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceSettings {
    pub voice: String,
    pub rate: u32,
    pub pitch: u32,
}

#[derive(Debug, Default)]
struct ReplayLog {
    settings: VoiceSettings,
    utterances: Vec<String>,
}

/// Read-only view of what a [`ReplayEngine`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct ReplayObserver {
    log: Arc<Mutex<ReplayLog>>,
}

impl ReplayObserver {
    pub fn settings(&self) -> VoiceSettings {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).settings.clone()
    }

    /// Texts synthesized so far, in order
    pub fn utterances(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).utterances.clone()
    }
}

pub struct ReplayEngine {
    samples: Vec<f32>,
    sample_rate: u32,
    chunk_size: usize,
    observer: ReplayObserver,
}

impl ReplayEngine {
    pub fn new(samples: Vec<f32>, sample_rate: u32, chunk_size: usize) -> Self {
        Self {
            samples,
            sample_rate,
            chunk_size: chunk_size.max(1),
            observer: ReplayObserver::default(),
        }
    }

    pub fn from_buffer(buffer: AudioBuffer, chunk_size: usize) -> Self {
        Self::new(buffer.samples, buffer.sample_rate, chunk_size)
    }

    pub fn observer(&self) -> ReplayObserver {
        self.observer.clone()
    }

    fn duration_ms(&self, samples: usize) -> u64 {
        (samples_to_seconds(samples, self.sample_rate) * 1000.0).round() as u64
    }

    /// One word event per whitespace-separated word, evenly spaced
    fn word_events(&self, text: &str) -> Vec<SynthesisEvent> {
        let mut words = Vec::new();
        let mut start = None;
        for (offset, ch) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
            match (ch.is_whitespace(), start) {
                (false, None) => start = Some(offset),
                (true, Some(begin)) => {
                    words.push((begin, offset - begin));
                    start = None;
                }
                _ => {}
            }
        }

        let total_ms = self.duration_ms(self.samples.len());
        let count = words.len() as u64;
        words
            .into_iter()
            .enumerate()
            .map(|(index, (text_position, length))| SynthesisEvent {
                kind: SynthesisEventKind::Word,
                audio_position_ms: index as u64 * total_ms / count.max(1),
                text_position,
                length,
                name: None,
            })
            .collect()
    }
}

impl SynthesisEngine for ReplayEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_voice(&mut self, voice: &str) -> Result<()> {
        let mut log = self.observer.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.settings.voice = voice.to_string();
        Ok(())
    }

    fn set_rate(&mut self, rate: u32) -> Result<()> {
        let mut log = self.observer.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.settings.rate = rate;
        Ok(())
    }

    fn set_pitch(&mut self, pitch: u32) -> Result<()> {
        let mut log = self.observer.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.settings.pitch = pitch;
        Ok(())
    }

    fn synthesize(&mut self, text: &str, emit: &mut dyn FnMut(SynthesisMessage)) -> Result<()> {
        self.observer
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .utterances
            .push(text.to_string());

        let mut pending = self.word_events(text).into_iter().peekable();
        let chunk_count = self.samples.len().div_ceil(self.chunk_size);

        for (index, chunk) in self.samples.chunks(self.chunk_size).enumerate() {
            let chunk_end_ms = self.duration_ms((index + 1) * self.chunk_size);
            let mut events = Vec::new();
            while let Some(event) = pending.next_if(|e| e.audio_position_ms < chunk_end_ms) {
                events.push(event);
            }

            if index + 1 == chunk_count {
                events.extend(pending.by_ref());
                events.push(SynthesisEvent::new(
                    SynthesisEventKind::End,
                    self.duration_ms(self.samples.len()),
                ));
            }

            trace!("Replaying chunk {} ({} samples, {} events)", index, chunk.len(), events.len());
            emit(SynthesisMessage::Chunk {
                samples: chunk.to_vec(),
                events,
            });
        }

        emit(SynthesisMessage::EndOfUtterance);
        Ok(())
    }
}
