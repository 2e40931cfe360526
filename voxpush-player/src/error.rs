//! Error types for voxpush-player
//!
//! `ClosedStream` and `NoDestination` are synchronous precondition failures
//! returned to the caller of `StreamingSink::push`. Neither mutates sink state;
//! the caller may retry once the condition is remedied.

use thiserror::Error;

/// Main error type for voxpush-player
#[derive(Error, Debug)]
pub enum Error {
    /// Chunk pushed after the stream was closed
    #[error("Cannot push more chunks after the stream was closed")]
    ClosedStream,

    /// Chunk pushed before any destination was connected
    #[error("No destination set for streaming sink")]
    NoDestination,

    /// Audio output device or destination errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Delivery driver could not be started
    #[error("Delivery driver error: {0}")]
    Driver(String),

    /// Synthesis worker channel failures
    #[error("Synthesis transport error: {0}")]
    Transport(String),

    /// Synthesis engine errors
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// WAV file encoding/decoding errors
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from shared voxpush code (configuration, input validation)
    #[error(transparent)]
    Common(#[from] voxpush_common::Error),
}

/// Convenience Result type using voxpush-player Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_messages() {
        assert_eq!(
            Error::ClosedStream.to_string(),
            "Cannot push more chunks after the stream was closed"
        );
        assert_eq!(
            Error::NoDestination.to_string(),
            "No destination set for streaming sink"
        );
    }

    #[test]
    fn test_common_error_is_transparent() {
        let err: Error = voxpush_common::Error::Config("bad".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: bad");
    }
}
