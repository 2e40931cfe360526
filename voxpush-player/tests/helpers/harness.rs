//! Streaming sink harness for offline delivery tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use voxpush_player::playback::{CaptureDestination, ManualDriver, StreamingSink};

pub const TEST_SAMPLE_RATE: u32 = 22050;

/// Sink driven by hand, recording what it delivers and when it ends
pub struct SinkHarness {
    pub sink: StreamingSink,
    pub driver: ManualDriver,
    pub capture: CaptureDestination,
    starts: Arc<AtomicUsize>,
    ends: Arc<Mutex<Vec<f64>>>,
}

impl SinkHarness {
    /// Sink with a connected capture destination
    pub fn new(buffer_size: usize) -> Self {
        let harness = Self::unconnected(buffer_size);
        harness
            .sink
            .connect(harness.capture.clone())
            .expect("capture connect never fails");
        harness
    }

    /// Sink with no destination registered yet
    pub fn unconnected(buffer_size: usize) -> Self {
        let driver = ManualDriver::new(TEST_SAMPLE_RATE, buffer_size);
        let starts = Arc::new(AtomicUsize::new(0));
        let ends = Arc::new(Mutex::new(Vec::new()));

        let starts_clone = Arc::clone(&starts);
        let ends_clone = Arc::clone(&ends);
        let sink = StreamingSink::builder(TEST_SAMPLE_RATE, buffer_size)
            .on_start(move || {
                starts_clone.fetch_add(1, Ordering::SeqCst);
            })
            .on_end(move |elapsed| ends_clone.lock().unwrap().push(elapsed))
            .build(driver.clone())
            .expect("valid sink parameters");

        Self {
            sink,
            driver,
            capture: CaptureDestination::new("harness"),
            starts,
            ends,
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Elapsed durations reported by end notifications, in order
    pub fn ends(&self) -> Vec<f64> {
        self.ends.lock().unwrap().clone()
    }

    /// Tick until the session stops itself (bounded)
    pub fn drain(&self) -> Vec<Vec<f32>> {
        self.driver.run_until_stopped(100_000)
    }
}
