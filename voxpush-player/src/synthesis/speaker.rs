//! High-level speech facade over a synthesis worker

use super::worker::SynthesisWorker;
use crate::audio::{AudioBuffer, SampleChunk};
use crate::dsp::{EnhancementPipeline, PipelineParams, Reverb, Stage};
use crate::error::{Error, Result};
use crate::playback::StreamingSink;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use voxpush_common::config::{SpeakOptions, SpeakOverrides};
use voxpush_common::{SynthesisEvent, SynthesisMessage};

/// What a real-time utterance pushed into its sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub chunks: usize,
    pub samples: usize,
    /// Engine events scheduled as track callbacks
    pub events: usize,
}

/// Speaks text through a [`SynthesisWorker`] using configured defaults
pub struct Speaker {
    worker: SynthesisWorker,
    defaults: SpeakOptions,
}

impl Speaker {
    pub fn new(worker: SynthesisWorker, defaults: SpeakOptions) -> Self {
        Self { worker, defaults }
    }

    pub fn defaults(&self) -> &SpeakOptions {
        &self.defaults
    }

    pub fn worker(&self) -> &SynthesisWorker {
        &self.worker
    }

    /// Batch path: synthesize, merge, enhance
    ///
    /// Returns `None` if the worker could not be reached or the utterance was
    /// cut off; the failure is logged and not retried.
    pub async fn speak(&self, text: &str, overrides: &SpeakOverrides) -> Option<AudioBuffer> {
        match self.try_speak(text, overrides).await {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                error!(error = %e, "Speech synthesis failed");
                None
            }
        }
    }

    /// Like [`speak`](Self::speak), but reports why it failed
    pub async fn try_speak(&self, text: &str, overrides: &SpeakOverrides) -> Result<AudioBuffer> {
        let options = self.defaults.with_overrides(overrides);
        let sample_rate = self.worker.ready().await?;
        self.worker
            .configure(&options.voice, options.rate, options.pitch)?;

        let mut replies = self.worker.synthesize(text)?;
        let mut chunks = Vec::new();
        loop {
            match replies.recv().await {
                Some(SynthesisMessage::Chunk { samples, .. }) => {
                    chunks.push(SampleChunk::from(samples));
                }
                Some(SynthesisMessage::EndOfUtterance) => break,
                None => {
                    return Err(Error::Transport(format!(
                        "Synthesis stopped after {} chunks without end of utterance",
                        chunks.len()
                    )))
                }
            }
        }
        debug!(chunks = chunks.len(), "Utterance collected");

        // Stage loops are CPU bound
        let processed = tokio::task::spawn_blocking(move || {
            let pipeline = EnhancementPipeline::new(PipelineParams::from(&options));
            let mut buffer = pipeline.process_chunks(chunks, sample_rate);
            if options.reverb {
                buffer = buffer.with_samples(Reverb::new(sample_rate).process(&buffer.samples));
            }
            buffer
        })
        .await
        .map_err(|e| Error::Synthesis(format!("Enhancement task failed: {}", e)))?;

        info!(
            samples = processed.len(),
            duration_secs = processed.duration_seconds(),
            "Utterance ready"
        );
        Ok(processed)
    }

    /// Real-time path: push chunks into `sink` as they are synthesized
    ///
    /// Each chunk's engine events are registered as track callbacks at their
    /// audio position before the chunk is pushed; when a callback fires the
    /// event is sent on `events`. The sink is closed on end of utterance, and
    /// also when the worker fails mid-utterance so the audio already queued
    /// still drains.
    ///
    /// Returns once the last chunk is queued, not when playback ends.
    pub async fn stream(
        &self,
        text: &str,
        overrides: &SpeakOverrides,
        sink: &StreamingSink,
        events: Option<mpsc::UnboundedSender<SynthesisEvent>>,
    ) -> Result<StreamReport> {
        let options = self.defaults.with_overrides(overrides);
        let sample_rate = self.worker.ready().await?;
        if sample_rate != sink.sample_rate() {
            warn!(
                engine_rate = sample_rate,
                sink_rate = sink.sample_rate(),
                "Engine and sink sample rates differ; playback speed will be off"
            );
        }

        self.worker
            .configure(&options.voice, options.rate, options.pitch)?;
        let mut replies = self.worker.synthesize(text)?;
        let mut report = StreamReport::default();

        loop {
            match replies.recv().await {
                Some(SynthesisMessage::Chunk { samples, events: chunk_events }) => {
                    if let Some(tx) = events.as_ref() {
                        for event in chunk_events {
                            let tx = tx.clone();
                            sink.add_track_callback(event.audio_position_secs(), move || {
                                let _ = tx.send(event);
                            });
                            report.events += 1;
                        }
                    }

                    report.chunks += 1;
                    report.samples += samples.len();
                    trace!(chunk = report.chunks, samples = samples.len(), "Pushing chunk");
                    sink.push(samples)?;
                }
                Some(SynthesisMessage::EndOfUtterance) => {
                    sink.close();
                    info!(
                        session = %sink.session_id(),
                        chunks = report.chunks,
                        samples = report.samples,
                        "Utterance fully queued"
                    );
                    return Ok(report);
                }
                None => {
                    sink.close();
                    error!(chunks = report.chunks, "Synthesis stopped without end of utterance");
                    return Err(Error::Transport(
                        "Synthesis stopped without end of utterance".to_string(),
                    ));
                }
            }
        }
    }

    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

/// Play a finished buffer through `sink` as a single chunk, then close it
pub fn play_buffer(buffer: &AudioBuffer, sink: &StreamingSink) -> Result<()> {
    if buffer.sample_rate != sink.sample_rate() {
        warn!(
            buffer_rate = buffer.sample_rate,
            sink_rate = sink.sample_rate(),
            "Buffer and sink sample rates differ"
        );
    }

    if !buffer.is_empty() {
        sink.push(buffer.samples.as_slice())?;
    }
    sink.close();
    Ok(())
}
