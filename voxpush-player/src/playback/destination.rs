//! Output destinations for the streaming sink
//!
//! A destination is an opaque endpoint the sink fans each rendered block out
//! to. The sink treats it as a capability: connect when the session binds,
//! receive blocks while active, disconnect on teardown.
//!
//! `write` runs inside the real-time delivery callback and cannot fail; an
//! implementation that hits an error logs it and drops the block.

use crate::audio::wav::mono_float_spec;
use crate::error::{Error, Result};
use hound::WavWriter;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Audio-graph endpoint that receives rendered blocks
pub trait Destination: Send {
    /// Human-readable name for logging
    fn name(&self) -> String;

    /// Prepare to receive blocks; called when the sink binds
    fn connect(&mut self) -> Result<()>;

    /// Receive one rendered block (called from the delivery callback)
    fn write(&mut self, block: &[f32]);

    /// Let already-written audio finish playing before a natural end of
    /// playback. Not called by `StreamingSink::disconnect`.
    fn drain(&mut self) {}

    /// Stop receiving blocks; called on teardown. Idempotent.
    fn disconnect(&mut self);
}

impl Destination for Box<dyn Destination> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn write(&mut self, block: &[f32]) {
        (**self).write(block)
    }

    fn drain(&mut self) {
        (**self).drain()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    samples: Vec<f32>,
    connected: bool,
    connects: usize,
    blocks: usize,
    drains: usize,
}

/// In-memory destination that records everything delivered to it
///
/// Clones share the recording, so one clone can be handed to a sink while
/// another inspects what arrived.
#[derive(Debug, Clone, Default)]
pub struct CaptureDestination {
    label: String,
    state: Arc<Mutex<CaptureState>>,
}

impl CaptureDestination {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Arc::default(),
        }
    }

    /// Everything delivered so far, in order
    pub fn samples(&self) -> Vec<f32> {
        self.lock().samples.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// How many times the destination was connected
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Number of blocks received
    pub fn block_count(&self) -> usize {
        self.lock().blocks
    }

    /// How many times playback ended naturally on this destination
    pub fn drain_count(&self) -> usize {
        self.lock().drains
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Destination for CaptureDestination {
    fn name(&self) -> String {
        format!("capture:{}", self.label)
    }

    fn connect(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    fn write(&mut self, block: &[f32]) {
        let mut state = self.lock();
        state.samples.extend_from_slice(block);
        state.blocks += 1;
    }

    fn drain(&mut self) {
        self.lock().drains += 1;
    }

    fn disconnect(&mut self) {
        self.lock().connected = false;
    }
}

/// Destination that records delivered blocks to a 32-bit float WAV file
///
/// The file is created on connect and finalized on disconnect. Writes go
/// through a `BufWriter`; use it with offline drivers or accept occasional
/// I/O inside the delivery callback.
pub struct WavDestination {
    path: PathBuf,
    sample_rate: u32,
    writer: Option<WavWriter<BufWriter<File>>>,
    samples_written: u64,
}

impl WavDestination {
    pub fn new<P: AsRef<Path>>(path: P, sample_rate: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sample_rate,
            writer: None,
            samples_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl Destination for WavDestination {
    fn name(&self) -> String {
        format!("wav:{}", self.path.display())
    }

    fn connect(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let writer = WavWriter::create(&self.path, mono_float_spec(self.sample_rate))
            .map_err(|e| Error::AudioOutput(format!("Failed to create {:?}: {}", self.path, e)))?;
        self.writer = Some(writer);
        self.samples_written = 0;
        info!("Recording delivered audio to {:?}", self.path);
        Ok(())
    }

    fn write(&mut self, block: &[f32]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        for &sample in block {
            if let Err(e) = writer.write_sample(sample) {
                warn!("Dropping block for {:?}: {}", self.path, e);
                return;
            }
            self.samples_written += 1;
        }
    }

    fn disconnect(&mut self) {
        if let Some(writer) = self.writer.take() {
            match writer.finalize() {
                Ok(()) => debug!(
                    "Finalized {:?} ({} samples)",
                    self.path, self.samples_written
                ),
                Err(e) => warn!("Failed to finalize {:?}: {}", self.path, e),
            }
        }
    }
}

impl Drop for WavDestination {
    fn drop(&mut self) {
        self.disconnect();
    }
}
