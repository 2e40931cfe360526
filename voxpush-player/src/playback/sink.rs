//! Streaming sink: bridges a chunked sample producer to a pull-driven consumer
//!
//! The sink owns a [`SampleQueue`] and a [`TrackEventScheduler`]. Producers
//! `push` chunks as they arrive; once at least one destination is connected
//! and audio is queued, the sink binds: destinations are connected and the
//! delivery callback is handed to the [`AudioDriver`]. Each delivery
//! invocation then:
//!
//! 1. records the first playback time and fires the start notification once
//! 2. computes the window `[now - start, now - start + block / sample_rate)`
//! 3. fires the track callbacks inside the window, dropping stale ones
//! 4. drains up to one block from the queue (an under-run leaves silence)
//! 5. if the queue is empty and the sink is closed, fires the end
//!    notification and tears the session down
//!
//! Notifications and track callbacks run while the sink's lock is released,
//! so they may call back into the sink (including `disconnect`). Track
//! callbacks run before the drain: a callback that pushes or closes shapes
//! the block it fires in.
//!
//! Lock order is driver, then state. `bind` never holds both at once.

use crate::audio::SampleChunk;
use crate::error::{Error, Result};
use crate::playback::destination::Destination;
use crate::playback::driver::{AudioDriver, Flow};
use crate::playback::queue::SampleQueue;
use crate::playback::scheduler::{DueCallbacks, TrackEventScheduler};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Start-of-playback notification
pub type StartNotify = Arc<dyn Fn() + Send + Sync + 'static>;

/// End-of-playback notification, given the elapsed playback duration in seconds
pub type EndNotify = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// Lifecycle state of a streaming sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// No destination registered
    Idle,
    /// Destination registered, not yet bound to the delivery callback
    Pending,
    /// Bound and draining
    Active,
    /// Closed, queued samples still to be delivered
    ClosedDraining,
    /// Closed and fully drained; disconnected
    Terminated,
}

impl std::fmt::Display for SinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SinkState::Idle => "Idle",
            SinkState::Pending => "Pending",
            SinkState::Active => "Active",
            SinkState::ClosedDraining => "ClosedDraining",
            SinkState::Terminated => "Terminated",
        };
        write!(f, "{}", name)
    }
}

struct SinkInner {
    session_id: Uuid,
    queue: SampleQueue,
    scheduler: TrackEventScheduler,
    destinations: Vec<Box<dyn Destination>>,
    bound: bool,
    closed: bool,
    /// Bumped on every bind and teardown; a delivery callback from an older
    /// session stops itself
    generation: u64,
    start_time: Option<f64>,
    delivered_samples: u64,
    underrun_blocks: u64,
}

impl SinkInner {
    /// Disconnect destinations and drop everything unplayed
    fn teardown(&mut self) {
        if self.bound {
            for destination in self.destinations.iter_mut() {
                destination.disconnect();
            }
        }
        let dropped_samples = self.queue.len();
        let dropped_callbacks = self.scheduler.callback_count();
        self.queue.clear();
        self.scheduler.clear();
        self.bound = false;
        self.start_time = None;
        self.generation += 1;

        if dropped_samples > 0 || dropped_callbacks > 0 {
            debug!(
                session = %self.session_id,
                "Discarded {} unplayed samples and {} unfired track callbacks",
                dropped_samples,
                dropped_callbacks
            );
        }
    }
}

struct SinkShared {
    sample_rate: u32,
    buffer_size: usize,
    inner: Mutex<SinkInner>,
    driver: Mutex<Box<dyn AudioDriver>>,
    on_start: Option<StartNotify>,
    on_end: Option<EndNotify>,
}

impl SinkShared {
    fn lock_inner(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_driver(&self) -> MutexGuard<'_, Box<dyn AudioDriver>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`StreamingSink`]
pub struct StreamingSinkBuilder {
    sample_rate: u32,
    buffer_size: usize,
    on_start: Option<StartNotify>,
    on_end: Option<EndNotify>,
}

impl StreamingSinkBuilder {
    /// Called once per session, on the first delivery invocation
    pub fn on_start<F>(mut self, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(notify));
        self
    }

    /// Called once per session when the closed sink has fully drained
    pub fn on_end<F>(mut self, notify: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_end = Some(Arc::new(notify));
        self
    }

    pub fn build<D>(self, driver: D) -> Result<StreamingSink>
    where
        D: AudioDriver + 'static,
    {
        if self.sample_rate == 0 || self.buffer_size == 0 {
            return Err(voxpush_common::Error::InvalidInput(format!(
                "Sink needs a positive sample rate and buffer size (got {}Hz, {} samples)",
                self.sample_rate, self.buffer_size
            ))
            .into());
        }

        let inner = SinkInner {
            session_id: Uuid::new_v4(),
            queue: SampleQueue::new(),
            scheduler: TrackEventScheduler::new(),
            destinations: Vec::new(),
            bound: false,
            closed: false,
            generation: 0,
            start_time: None,
            delivered_samples: 0,
            underrun_blocks: 0,
        };

        Ok(StreamingSink {
            shared: Arc::new(SinkShared {
                sample_rate: self.sample_rate,
                buffer_size: self.buffer_size,
                inner: Mutex::new(inner),
                driver: Mutex::new(Box::new(driver)),
                on_start: self.on_start,
                on_end: self.on_end,
            }),
        })
    }
}

/// Real-time streaming sink (cheaply cloneable handle)
#[derive(Clone)]
pub struct StreamingSink {
    shared: Arc<SinkShared>,
}

impl StreamingSink {
    /// Sink without start/end notifications
    pub fn new<D>(sample_rate: u32, buffer_size: usize, driver: D) -> Result<Self>
    where
        D: AudioDriver + 'static,
    {
        Self::builder(sample_rate, buffer_size).build(driver)
    }

    pub fn builder(sample_rate: u32, buffer_size: usize) -> StreamingSinkBuilder {
        StreamingSinkBuilder {
            sample_rate,
            buffer_size,
            on_start: None,
            on_end: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size
    }

    /// Queue a chunk for playback
    ///
    /// Binds the session on first use if a destination is registered.
    ///
    /// # Errors
    /// - [`Error::ClosedStream`] if the sink was closed
    /// - [`Error::NoDestination`] if no destination was ever connected
    /// - destination or driver errors while binding (the chunk stays queued;
    ///   a later `connect` retries the bind)
    ///
    /// Precondition failures leave the queue untouched.
    pub fn push(&self, chunk: impl Into<SampleChunk>) -> Result<()> {
        let chunk = chunk.into();
        let mut inner = self.shared.lock_inner();

        if inner.closed {
            return Err(Error::ClosedStream);
        }
        if !inner.bound && inner.destinations.is_empty() {
            return Err(Error::NoDestination);
        }

        trace!(session = %inner.session_id, "Queued chunk of {} samples", chunk.len());
        inner.queue.append(chunk);

        if inner.bound {
            return Ok(());
        }
        self.bind(inner)
    }

    /// Register an additional output destination
    ///
    /// Joins an active session immediately; binds if audio is already queued.
    pub fn connect<D>(&self, destination: D) -> Result<()>
    where
        D: Destination + 'static,
    {
        let mut destination: Box<dyn Destination> = Box::new(destination);
        let mut inner = self.shared.lock_inner();

        if inner.bound {
            destination.connect()?;
            info!(session = %inner.session_id, "Destination {} joined active session", destination.name());
            inner.destinations.push(destination);
            return Ok(());
        }

        debug!(session = %inner.session_id, "Registered destination {}", destination.name());
        inner.destinations.push(destination);

        if inner.queue.is_empty() {
            return Ok(());
        }
        self.bind(inner)
    }

    /// Stop accepting chunks; queued audio keeps playing
    ///
    /// The end notification fires once the queue drains. A sink that was
    /// never bound has nothing to drain and terminates immediately.
    pub fn close(&self) {
        let mut inner = self.shared.lock_inner();
        if inner.closed {
            return;
        }
        inner.closed = true;
        info!(
            session = %inner.session_id,
            "Sink closed ({} samples still queued)",
            inner.queue.len()
        );

        if inner.bound || !inner.queue.is_empty() {
            return;
        }

        inner.teardown();
        drop(inner);
        info!("Sink terminated without playing");
        if let Some(on_end) = self.shared.on_end.as_ref() {
            on_end(0.0);
        }
    }

    /// Immediate teardown: stop delivery, disconnect destinations, discard
    /// unplayed samples and unfired callbacks. Idempotent.
    ///
    /// Destinations stay registered, so an open sink can start a fresh
    /// session with the next `push`.
    pub fn disconnect(&self) {
        // Driver first: a concurrent bind cannot start a new session between
        // the teardown and the stop
        let mut driver = self.shared.lock_driver();
        {
            let mut inner = self.shared.lock_inner();
            if inner.bound {
                info!(session = %inner.session_id, "Disconnecting sink");
            }
            inner.teardown();
        }
        driver.stop();
    }

    /// Register `callback` to fire when playback reaches `timestamp` seconds
    pub fn add_track_callback<F>(&self, timestamp: f64, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.lock_inner().scheduler.schedule(timestamp, callback);
    }

    pub fn state(&self) -> SinkState {
        let inner = self.shared.lock_inner();
        if inner.closed {
            if inner.bound || !inner.queue.is_empty() {
                SinkState::ClosedDraining
            } else {
                SinkState::Terminated
            }
        } else if inner.bound {
            SinkState::Active
        } else if !inner.destinations.is_empty() {
            SinkState::Pending
        } else {
            SinkState::Idle
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock_inner().closed
    }

    /// Samples waiting to be delivered
    pub fn queued_samples(&self) -> usize {
        self.shared.lock_inner().queue.len()
    }

    /// Track callbacks not yet fired or dropped
    pub fn scheduled_callbacks(&self) -> usize {
        self.shared.lock_inner().scheduler.callback_count()
    }

    /// Real (non-silence) samples delivered over the sink's lifetime
    pub fn delivered_samples(&self) -> u64 {
        self.shared.lock_inner().delivered_samples
    }

    pub fn destination_count(&self) -> usize {
        self.shared.lock_inner().destinations.len()
    }

    /// Id of the current (or most recent) session, for log correlation
    pub fn session_id(&self) -> Uuid {
        self.shared.lock_inner().session_id
    }

    /// Connect destinations and install the delivery callback. Binding
    /// happens at most once per session.
    fn bind(&self, mut inner: MutexGuard<'_, SinkInner>) -> Result<()> {
        if inner.bound {
            return Ok(());
        }

        for index in 0..inner.destinations.len() {
            if let Err(e) = inner.destinations[index].connect() {
                warn!(
                    session = %inner.session_id,
                    "Destination {} failed to connect: {}",
                    inner.destinations[index].name(),
                    e
                );
                for connected in inner.destinations[..index].iter_mut() {
                    connected.disconnect();
                }
                return Err(e);
            }
        }

        inner.bound = true;
        inner.generation += 1;
        inner.session_id = Uuid::new_v4();
        inner.underrun_blocks = 0;
        let generation = inner.generation;
        info!(
            session = %inner.session_id,
            "Sink bound to {} destination(s), {} samples queued",
            inner.destinations.len(),
            inner.queue.len()
        );
        drop(inner);

        let weak: Weak<SinkShared> = Arc::downgrade(&self.shared);
        let callback = Box::new(move |playback_time: f64, output: &mut [f32]| {
            match weak.upgrade() {
                Some(shared) => deliver(&shared, generation, playback_time, output),
                None => Flow::Stop,
            }
        });

        let started = self.shared.lock_driver().start(callback);
        if let Err(e) = started {
            let mut inner = self.shared.lock_inner();
            if inner.generation == generation {
                // Keep queued audio for a retry; only the binding is undone
                for destination in inner.destinations.iter_mut() {
                    destination.disconnect();
                }
                inner.bound = false;
                inner.generation += 1;
            }
            return Err(e);
        }
        Ok(())
    }
}

/// One delivery invocation (runs on the driver's thread)
///
/// The lock is released while the start notification and the due track
/// callbacks run, then retaken for the drain. A callback that closes, pushes
/// to or disconnects the sink therefore affects the block it fires in.
fn deliver(shared: &SinkShared, generation: u64, playback_time: f64, output: &mut [f32]) -> Flow {
    let window_duration = output.len() as f64 / shared.sample_rate as f64;

    let (started, window_start, due) = {
        let mut inner = shared.lock_inner();
        if !inner.bound || inner.generation != generation {
            return Flow::Stop;
        }

        let (started, start) = match inner.start_time {
            Some(start) => (false, start),
            None => {
                inner.start_time = Some(playback_time);
                (true, playback_time)
            }
        };

        let window_start = playback_time - start;
        let due: DueCallbacks = inner.scheduler.take_due(window_start, window_duration);
        (started, window_start, due)
    };

    if started {
        if let Some(on_start) = shared.on_start.as_ref() {
            on_start();
        }
    }

    let report = due.fire();
    if report.fired > 0 {
        trace!("Fired {} track callback(s)", report.fired);
    }

    let ended = {
        let mut inner = shared.lock_inner();
        if !inner.bound || inner.generation != generation {
            trace!("Session ended by a notification or track callback");
            return Flow::Stop;
        }

        let filled = inner.queue.drain_into(output);
        inner.delivered_samples += filled as u64;

        for destination in inner.destinations.iter_mut() {
            destination.write(output);
        }

        if filled < output.len() && !inner.closed {
            inner.underrun_blocks += 1;
            debug!(
                session = %inner.session_id,
                "Under-run at {:.3}s: {} of {} samples available (under-run blocks: {})",
                window_start,
                filled,
                output.len(),
                inner.underrun_blocks
            );
        }

        if inner.queue.is_empty() && inner.closed {
            let elapsed = window_start + filled as f64 / shared.sample_rate as f64;
            info!(
                session = %inner.session_id,
                "Playback finished after {:.3}s ({} samples delivered)",
                elapsed,
                inner.delivered_samples
            );
            for destination in inner.destinations.iter_mut() {
                destination.drain();
            }
            inner.teardown();
            Some(elapsed)
        } else {
            None
        }
    };

    match ended {
        Some(elapsed) => {
            if let Some(on_end) = shared.on_end.as_ref() {
                on_end(elapsed);
            }
            Flow::Stop
        }
        None => Flow::Continue,
    }
}
