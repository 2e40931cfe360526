//! Audio data types, WAV file I/O and the hardware output destination

pub mod output;
pub mod types;
pub mod wav;

pub use output::DeviceDestination;
pub use types::{AudioBuffer, SampleChunk};
