//! Timestamp-keyed track callback registry
//!
//! Callbacks are registered against playback-clock instants (seconds from
//! stream start) and fired when a delivery window covers them. Entries are
//! keyed by tick (see `voxpush_common::timing`), so the registry iterates in
//! timestamp order and each distinct instant appears at most once.
//!
//! Per window `[start, start + duration)`:
//! - entries before `start` are dropped without firing (the window already
//!   passed them; a silent miss)
//! - entries inside the window fire in registration order, then are removed
//! - entries at or after the window end stay for a later window
//!
//! Window bounds are compared at tick resolution (1/28,224,000 s), not in
//! `f64`. A timestamp within half a tick of a bound is treated as lying on
//! it: one just before `start` fires in this window rather than being
//! dropped, and one just before the window end waits for the next window.
//! This keeps callbacks on sample boundaries stable when the playback clock
//! is offset (`playback_time - start` is not exact in floating point).
//!
//! Callbacks are `FnOnce`, so a callback can never fire twice.

use std::collections::BTreeMap;
use tracing::{debug, trace};
use voxpush_common::timing::seconds_to_ticks;

/// Callback fired when playback reaches its timestamp
pub type TrackCallback = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of one scheduler window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Callbacks fired in this window
    pub fired: usize,

    /// Stale entries dropped without firing
    pub dropped_entries: usize,
}

/// Callbacks due in one window, in timestamp then registration order
pub struct DueCallbacks {
    pub callbacks: Vec<TrackCallback>,
    pub dropped_entries: usize,
}

impl DueCallbacks {
    /// Fire every due callback, consuming them
    pub fn fire(self) -> AdvanceReport {
        let fired = self.callbacks.len();
        for callback in self.callbacks {
            callback();
        }
        AdvanceReport {
            fired,
            dropped_entries: self.dropped_entries,
        }
    }
}

impl std::fmt::Debug for DueCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DueCallbacks")
            .field("callbacks", &self.callbacks.len())
            .field("dropped_entries", &self.dropped_entries)
            .finish()
    }
}

/// Timestamp → callbacks registry
#[derive(Default)]
pub struct TrackEventScheduler {
    entries: BTreeMap<i64, Vec<TrackCallback>>,
}

impl TrackEventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` at `timestamp` seconds from stream start
    ///
    /// Callbacks sharing a timestamp fire together, in registration order.
    pub fn schedule<F>(&mut self, timestamp: f64, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let key = seconds_to_ticks(timestamp);
        self.entries.entry(key).or_default().push(Box::new(callback));
        trace!("Scheduled track callback at {:.6}s ({} entries)", timestamp, self.entries.len());
    }

    /// Remove and return the callbacks due in `[window_start, window_start + window_duration)`
    ///
    /// Stale entries are removed and counted but never returned. Work is
    /// proportional to the entries removed, not to the registry size.
    pub fn take_due(&mut self, window_start: f64, window_duration: f64) -> DueCallbacks {
        let start = seconds_to_ticks(window_start);
        let end = start.saturating_add(seconds_to_ticks(window_duration));

        // entries: [.., start) | current: [start, ..)
        let mut current = self.entries.split_off(&start);
        // current: [start, end) | future: [end, ..)
        let future = current.split_off(&end);
        let stale = std::mem::replace(&mut self.entries, future);

        if !stale.is_empty() {
            debug!(
                "Dropped {} stale track callback entr{} before {:.6}s",
                stale.len(),
                if stale.len() == 1 { "y" } else { "ies" },
                window_start
            );
        }

        DueCallbacks {
            callbacks: current.into_values().flatten().collect(),
            dropped_entries: stale.len(),
        }
    }

    /// Fire the callbacks due in the window synchronously and remove them
    pub fn advance(&mut self, window_start: f64, window_duration: f64) -> AdvanceReport {
        self.take_due(window_start, window_duration).fire()
    }

    /// Number of distinct registered timestamps
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total callbacks across all entries
    pub fn callback_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Drop every unfired callback
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for TrackEventScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEventScheduler")
            .field("entries", &self.entries.len())
            .field("callbacks", &self.callback_count())
            .finish()
    }
}
