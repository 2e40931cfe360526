//! WAV file reading and writing via hound
//!
//! Recorded utterances are read as mono f32 (multi-channel files are mixed
//! down); processed buffers are written as 32-bit float mono.

use crate::audio::AudioBuffer;
use crate::error::Result;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::debug;

/// Read a WAV file into a mono buffer
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    debug!(
        "Read {:?}: {} samples @ {}Hz ({} channel(s) in file)",
        path,
        samples.len(),
        spec.sample_rate,
        channels
    );

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Float WAV spec for a mono stream at `sample_rate`
pub fn mono_float_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Write a mono buffer as a 32-bit float WAV file
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer) -> Result<()> {
    let mut writer = WavWriter::create(path.as_ref(), mono_float_spec(buffer.sample_rate))?;
    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    debug!("Wrote {:?}: {} samples", path.as_ref(), buffer.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_roundtrip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utterance.wav");

        let buffer = AudioBuffer::new(vec![0.0, 0.25, -0.5, 0.999], 22050);
        write_wav(&path, &buffer).unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read, buffer);
    }

    #[test]
    fn test_int_stereo_is_scaled_and_mixed_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        // One frame: L = +half scale, R = 0
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.sample_rate, 16000);
        assert_eq!(read.samples, vec![0.25]);
    }

    #[test]
    fn test_missing_file_is_wav_error() {
        let err = read_wav("/nonexistent/voxpush.wav").unwrap_err();
        assert!(matches!(err, crate::Error::Wav(_)));
    }
}
