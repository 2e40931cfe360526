//! Delivery drivers: who invokes the sink's real-time callback
//!
//! A driver plays the role of the audio subsystem. Once started, it calls the
//! delivery callback once per fixed-size buffer with a zero-filled output block
//! and the absolute playback time of that block. The callback answers with a
//! [`Flow`] so a session can end itself without the driver having to be
//! stopped from inside its own callback.
//!
//! - [`ThreadDriver`]: dedicated thread paced at `buffer_size / sample_rate`
//! - [`ManualDriver`]: callback invoked by [`ManualDriver::tick`] (offline
//!   rendering, tests)

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Whether the driver should keep invoking the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Real-time delivery callback: `(playback_time_secs, output_block) -> Flow`
pub type DeliveryCallback = Box<dyn FnMut(f64, &mut [f32]) -> Flow + Send + 'static>;

/// Registrar for the periodic delivery callback
pub trait AudioDriver: Send {
    /// Begin invoking `callback` at the driver's cadence
    fn start(&mut self, callback: DeliveryCallback) -> Result<()>;

    /// Stop invoking the callback and release it. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Driver that runs the callback on a dedicated thread at real-time cadence
///
/// Playback times passed to the callback are the scheduled start of each
/// block (`block_index * buffer_size / sample_rate`), so the playback clock
/// advances by exactly one buffer per invocation even when the thread wakes
/// late.
///
/// Every start gets its own run flag. `stop` clears the flag and returns
/// without joining: the thread exits before its next block, and a callback
/// may stop or restart its own driver without waiting on itself.
pub struct ThreadDriver {
    sample_rate: u32,
    buffer_size: usize,
    running: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadDriver {
    pub fn new(sample_rate: u32, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            buffer_size,
            running: None,
            handle: None,
        }
    }

    fn period_secs(&self) -> f64 {
        self.buffer_size as f64 / self.sample_rate as f64
    }

    /// Join a previous thread that has already finished
    fn reap(&mut self) {
        let finished = self.handle.as_ref().is_some_and(|h| h.is_finished());
        if finished {
            if let Some(handle) = self.handle.take() {
                if handle.join().is_err() {
                    warn!("Delivery thread panicked");
                }
            }
        }
    }
}

impl AudioDriver for ThreadDriver {
    fn start(&mut self, mut callback: DeliveryCallback) -> Result<()> {
        if self.is_running() {
            return Err(Error::Driver("Delivery thread already running".to_string()));
        }
        if self.sample_rate == 0 || self.buffer_size == 0 {
            return Err(Error::Driver(format!(
                "Invalid cadence: {} samples @ {}Hz",
                self.buffer_size, self.sample_rate
            )));
        }

        self.reap();

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let buffer_size = self.buffer_size;
        let period_secs = self.period_secs();

        let handle = thread::Builder::new()
            .name("voxpush-delivery".to_string())
            .spawn(move || {
                let epoch = Instant::now();
                let mut block = vec![0.0f32; buffer_size];
                let mut index: u64 = 0;
                let mut late_blocks: u64 = 0;

                while thread_running.load(Ordering::Acquire) {
                    block.fill(0.0);
                    let playback_time = index as f64 * period_secs;
                    if callback(playback_time, &mut block) == Flow::Stop {
                        debug!("Delivery callback requested stop after {} blocks", index + 1);
                        break;
                    }
                    index += 1;

                    let deadline = epoch + Duration::from_secs_f64(index as f64 * period_secs);
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        late_blocks += 1;
                        if late_blocks % 100 == 1 {
                            warn!(
                                "Delivery thread behind schedule by {:?} (late blocks: {})",
                                now - deadline,
                                late_blocks
                            );
                        }
                    }
                }

                thread_running.store(false, Ordering::Release);
                trace!("Delivery thread exiting");
            })
            .map_err(|e| Error::Driver(format!("Failed to spawn delivery thread: {}", e)))?;

        self.running = Some(running);
        self.handle = Some(handle);
        info!(
            "Delivery thread started: {} samples @ {}Hz ({:.1}ms cadence)",
            self.buffer_size,
            self.sample_rate,
            period_secs * 1000.0
        );
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            if running.swap(false, Ordering::AcqRel) {
                debug!("Delivery thread signalled to stop");
            }
        }
        self.reap();
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| running.load(Ordering::Acquire))
    }
}

impl Drop for ThreadDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct ManualState {
    callback: Option<DeliveryCallback>,
    /// Bumped by every start/stop so a tick in flight can tell it was superseded
    generation: u64,
    ticks: u64,
}

/// Driver whose callback runs only when [`tick`](ManualDriver::tick) is called
///
/// Clones share state: hand one clone to the sink and keep another to drive
/// it. Playback time starts at `start_time` and advances by exactly one
/// buffer per tick.
#[derive(Clone)]
pub struct ManualDriver {
    sample_rate: u32,
    buffer_size: usize,
    start_time: f64,
    state: Arc<Mutex<ManualState>>,
}

impl ManualDriver {
    pub fn new(sample_rate: u32, buffer_size: usize) -> Self {
        Self::with_start_time(sample_rate, buffer_size, 0.0)
    }

    /// Driver whose first block reports `start_time` as its playback time
    pub fn with_start_time(sample_rate: u32, buffer_size: usize, start_time: f64) -> Self {
        Self {
            sample_rate,
            buffer_size,
            start_time,
            state: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of blocks delivered so far
    pub fn ticks(&self) -> u64 {
        self.lock().ticks
    }

    /// Invoke the callback for one block
    ///
    /// Returns the rendered block, or `None` if no callback is installed.
    pub fn tick(&self) -> Option<Vec<f32>> {
        let (mut callback, generation, index) = {
            let mut state = self.lock();
            let callback = state.callback.take()?;
            (callback, state.generation, state.ticks)
        };

        let playback_time =
            self.start_time + index as f64 * self.buffer_size as f64 / self.sample_rate as f64;
        let mut block = vec![0.0f32; self.buffer_size];
        let flow = callback(playback_time, &mut block);

        let mut state = self.lock();
        if state.generation == generation {
            state.ticks += 1;
            if flow == Flow::Continue {
                state.callback = Some(callback);
            }
        }
        Some(block)
    }

    /// Tick until the callback stops or `max_ticks` blocks were delivered
    pub fn run_until_stopped(&self, max_ticks: usize) -> Vec<Vec<f32>> {
        let mut blocks = Vec::new();
        while blocks.len() < max_ticks {
            match self.tick() {
                Some(block) => blocks.push(block),
                None => break,
            }
        }
        blocks
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioDriver for ManualDriver {
    fn start(&mut self, callback: DeliveryCallback) -> Result<()> {
        let mut state = self.lock();
        if state.callback.is_some() {
            return Err(Error::Driver("Manual driver already started".to_string()));
        }
        state.callback = Some(callback);
        state.generation += 1;
        state.ticks = 0;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.callback = None;
        state.generation += 1;
    }

    fn is_running(&self) -> bool {
        self.lock().callback.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_manual_driver_advances_clock_per_block() {
        let mut driver = ManualDriver::with_start_time(22050, 4, 10.0);
        let times = Arc::new(Mutex::new(Vec::new()));
        let times_clone = Arc::clone(&times);

        driver
            .start(Box::new(move |t, out| {
                times_clone.lock().unwrap().push(t);
                out.fill(0.5);
                Flow::Continue
            }))
            .unwrap();

        assert_eq!(driver.tick(), Some(vec![0.5; 4]));
        driver.tick();
        driver.tick();

        let times = times.lock().unwrap();
        assert_eq!(times[0], 10.0);
        assert_eq!(times[1], 10.0 + 4.0 / 22050.0);
        assert_eq!(times[2], 10.0 + 8.0 / 22050.0);
        assert_eq!(driver.ticks(), 3);
    }

    #[test]
    fn test_manual_driver_honours_stop_flow() {
        let mut driver = ManualDriver::new(22050, 8);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        driver
            .start(Box::new(move |_, _| {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 2 {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }))
            .unwrap();

        let blocks = driver.run_until_stopped(10);
        assert_eq!(blocks.len(), 2);
        assert!(!driver.is_running());
        assert_eq!(driver.tick(), None);
    }

    #[test]
    fn test_manual_driver_rejects_double_start() {
        let mut driver = ManualDriver::new(22050, 8);
        driver.start(Box::new(|_, _| Flow::Continue)).unwrap();
        assert!(matches!(
            driver.start(Box::new(|_, _| Flow::Continue)),
            Err(Error::Driver(_))
        ));

        driver.stop();
        driver.stop();
        assert!(driver.start(Box::new(|_, _| Flow::Continue)).is_ok());
    }

    #[test]
    fn test_thread_driver_runs_until_stop_flow() {
        let mut driver = ThreadDriver::new(48000, 48);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        driver
            .start(Box::new(move |_, out| {
                assert!(out.iter().all(|s| *s == 0.0), "block must arrive zero-filled");
                out.fill(1.0);
                if calls_clone.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while driver.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(!driver.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        driver.stop();
    }

    #[test]
    fn test_thread_driver_rejects_zero_cadence() {
        let mut driver = ThreadDriver::new(22050, 0);
        assert!(driver.start(Box::new(|_, _| Flow::Continue)).is_err());
        assert!(!driver.is_running());
    }
}
