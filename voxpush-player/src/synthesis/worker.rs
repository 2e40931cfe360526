//! Synthesis worker: an engine on a dedicated thread behind channels
//!
//! Requests travel over an unbounded `tokio::sync::mpsc` channel and each
//! utterance gets its own reply channel. Nothing is shared with the caller
//! but the channels. Readiness is published once through a `watch` channel
//! after the engine has been constructed.

use super::engine::SynthesisEngine;
use crate::error::{Error, Result};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use voxpush_common::SynthesisMessage;

enum WorkerRequest {
    Configure {
        voice: String,
        rate: u32,
        pitch: u32,
    },
    Synthesize {
        text: String,
        reply: mpsc::UnboundedSender<SynthesisMessage>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Readiness {
    Starting,
    Ready { sample_rate: u32 },
    Failed(String),
}

/// Handle to a synthesis engine running on its own thread
pub struct SynthesisWorker {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    readiness: watch::Receiver<Readiness>,
    handle: Option<JoinHandle<()>>,
}

impl SynthesisWorker {
    /// Start a worker thread and construct the engine on it
    ///
    /// Returns as soon as the thread is running; use [`ready`](Self::ready)
    /// to wait for the engine.
    pub fn spawn<E, F>(factory: F) -> Result<Self>
    where
        E: SynthesisEngine + 'static,
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(Readiness::Starting);

        let handle = thread::Builder::new()
            .name("voxpush-synthesis".to_string())
            .spawn(move || run_worker(factory, request_rx, ready_tx))
            .map_err(|e| Error::Transport(format!("Failed to spawn synthesis worker: {}", e)))?;

        Ok(Self {
            requests: request_tx,
            readiness: ready_rx,
            handle: Some(handle),
        })
    }

    /// Wait until the engine is constructed; returns its sample rate
    ///
    /// # Errors
    /// [`Error::Transport`] if the engine failed to start or the worker died.
    pub async fn ready(&self) -> Result<u32> {
        let mut readiness = self.readiness.clone();
        loop {
            let state = readiness.borrow_and_update().clone();
            match state {
                Readiness::Ready { sample_rate } => return Ok(sample_rate),
                Readiness::Failed(reason) => {
                    return Err(Error::Transport(format!(
                        "Synthesis engine failed to start: {}",
                        reason
                    )))
                }
                Readiness::Starting => {}
            }

            readiness.changed().await.map_err(|_| {
                Error::Transport("Synthesis worker exited before becoming ready".to_string())
            })?;
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.readiness.borrow(), Readiness::Ready { .. })
    }

    /// Engine sample rate, once ready
    pub fn sample_rate(&self) -> Option<u32> {
        match *self.readiness.borrow() {
            Readiness::Ready { sample_rate } => Some(sample_rate),
            _ => None,
        }
    }

    /// Forward voice parameters to the engine verbatim
    pub fn configure(&self, voice: &str, rate: u32, pitch: u32) -> Result<()> {
        self.send(WorkerRequest::Configure {
            voice: voice.to_string(),
            rate,
            pitch,
        })
    }

    /// Start synthesizing `text`; messages arrive on the returned receiver
    ///
    /// A receiver that closes before `EndOfUtterance` means the worker or the
    /// engine failed mid-utterance.
    pub fn synthesize(&self, text: &str) -> Result<mpsc::UnboundedReceiver<SynthesisMessage>> {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        self.send(WorkerRequest::Synthesize {
            text: text.to_string(),
            reply: reply_tx,
        })?;
        Ok(reply_rx)
    }

    /// Close the request channel and wait for the thread to exit
    pub fn shutdown(self) {
        let Self {
            requests, handle, ..
        } = self;
        drop(requests);

        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Synthesis worker panicked");
            }
        }
        info!("Synthesis worker shut down");
    }

    fn send(&self, request: WorkerRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| Error::Transport("Synthesis worker is not running".to_string()))
    }
}

fn run_worker<E, F>(
    factory: F,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    readiness: watch::Sender<Readiness>,
) where
    E: SynthesisEngine,
    F: FnOnce() -> Result<E>,
{
    let mut engine = match factory() {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Synthesis engine failed to initialize");
            let _ = readiness.send(Readiness::Failed(e.to_string()));
            return;
        }
    };

    let sample_rate = engine.sample_rate();
    info!(sample_rate, "Synthesis worker ready");
    let _ = readiness.send(Readiness::Ready { sample_rate });

    loop {
        let Some(request) = requests.blocking_recv() else {
            debug!("Synthesis request channel closed");
            break;
        };

        match request {
            WorkerRequest::Configure { voice, rate, pitch } => {
                debug!(voice = %voice, rate, pitch, "Configuring synthesis engine");
                if let Err(e) = engine.set_voice(&voice) {
                    warn!(voice = %voice, error = %e, "Engine rejected voice");
                }
                if let Err(e) = engine.set_rate(rate) {
                    warn!(rate, error = %e, "Engine rejected rate");
                }
                if let Err(e) = engine.set_pitch(pitch) {
                    warn!(pitch, error = %e, "Engine rejected pitch");
                }
            }
            WorkerRequest::Synthesize { text, reply } => {
                let mut chunks = 0usize;
                let mut ended = false;

                let result = engine.synthesize(&text, &mut |message| {
                    if ended {
                        return;
                    }
                    match &message {
                        SynthesisMessage::EndOfUtterance => ended = true,
                        SynthesisMessage::Chunk { .. } => chunks += 1,
                    }
                    // The caller may have stopped listening
                    let _ = reply.send(message);
                });

                match result {
                    Ok(()) => {
                        if !ended {
                            let _ = reply.send(SynthesisMessage::EndOfUtterance);
                        }
                        debug!(chunks, characters = text.len(), "Utterance synthesized");
                    }
                    // Dropping the reply without an end marker tells the caller
                    Err(e) => error!(chunks, error = %e, "Synthesis failed mid-utterance"),
                }
            }
        }
    }

    info!("Synthesis worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::ReplayEngine;

    #[tokio::test]
    async fn test_ready_reports_sample_rate() {
        let worker = SynthesisWorker::spawn(|| Ok(ReplayEngine::new(vec![0.1; 100], 16000, 50))).unwrap();
        assert_eq!(worker.ready().await.unwrap(), 16000);
        assert!(worker.is_ready());
        assert_eq!(worker.sample_rate(), Some(16000));
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_failed_engine_fails_readiness_and_requests() {
        let worker = SynthesisWorker::spawn(|| -> Result<ReplayEngine> {
            Err(Error::Synthesis("no voice data".to_string()))
        })
        .unwrap();

        assert!(matches!(worker.ready().await, Err(Error::Transport(_))));
        assert!(!worker.is_ready());

        // Give the thread time to drop its receiver
        let mut attempts = 0;
        while worker.configure("en-us", 175, 50).is_ok() && attempts < 100 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            attempts += 1;
        }
        assert!(matches!(worker.synthesize("hi"), Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_synthesize_streams_chunks_then_end() {
        let worker = SynthesisWorker::spawn(|| Ok(ReplayEngine::new(vec![0.5; 250], 22050, 100))).unwrap();
        worker.ready().await.unwrap();

        let mut rx = worker.synthesize("hello").unwrap();
        let mut lengths = Vec::new();
        while let Some(message) = rx.recv().await {
            match message {
                SynthesisMessage::Chunk { samples, .. } => lengths.push(samples.len()),
                SynthesisMessage::EndOfUtterance => break,
            }
        }
        assert_eq!(lengths, vec![100, 100, 50]);
    }
}
