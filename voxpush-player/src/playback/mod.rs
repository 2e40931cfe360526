//! Real-time playback: streaming sink, delivery drivers and destinations
//!
//! The [`StreamingSink`] accepts sample chunks from a producer and hands them
//! to whatever drives the delivery callback, one fixed-size block at a time.

pub mod destination;
pub mod driver;
pub mod queue;
pub mod scheduler;
pub mod sink;

pub use destination::{CaptureDestination, Destination, WavDestination};
pub use driver::{AudioDriver, DeliveryCallback, Flow, ManualDriver, ThreadDriver};
pub use queue::SampleQueue;
pub use scheduler::{AdvanceReport, TrackCallback, TrackEventScheduler};
pub use sink::{SinkState, StreamingSink, StreamingSinkBuilder};
