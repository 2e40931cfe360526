//! Producer boundary: the synthesis engine and everything that talks to it
//!
//! The engine is an opaque producer of sample chunks. It runs on its own
//! thread inside a [`SynthesisWorker`] and is reached only through channels.
//! The [`Speaker`] facade drives it for both playback paths:
//! - batch: collect every chunk, merge, enhance, return one buffer
//! - real-time: push chunks into a [`StreamingSink`](crate::playback::StreamingSink)
//!   as they arrive

pub mod engine;
pub mod replay;
pub mod speaker;
pub mod worker;

pub use engine::SynthesisEngine;
pub use replay::ReplayEngine;
pub use speaker::{play_buffer, Speaker, StreamReport};
pub use worker::SynthesisWorker;
