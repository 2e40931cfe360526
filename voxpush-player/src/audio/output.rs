//! Audio device destination using cpal
//!
//! Bridges the sink's delivery callback to a hardware output stream through a
//! lock-free single-producer single-consumer ring buffer:
//! - Producer (delivery callback): pushes each rendered mono block
//! - Consumer (cpal callback): pops one sample per frame, duplicated across
//!   the device's channels; an empty ring yields silence
//!
//! The device must support the sink's sample rate; no resampling happens here.

use crate::error::{Error, Result};
use crate::playback::destination::Destination;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Ring capacity in delivery blocks
const RING_BLOCKS: usize = 4;

/// Extra time allowed for the ring to empty at the end of playback
const DRAIN_SLACK: Duration = Duration::from_millis(100);

const DRAIN_POLL: Duration = Duration::from_millis(2);

/// Poll `drained` until it reports true or `timeout` elapses
fn wait_until_drained<F>(mut drained: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if drained() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(DRAIN_POLL);
    }
}

/// Keeps the cpal stream alive while the destination is connected
///
/// The stream is only created, played and dropped from whichever thread owns
/// the destination; it is never shared.
struct StreamHolder(Stream);

// SAFETY: the wrapped stream is never accessed concurrently; it is only
// paused and dropped by the owning destination, which itself moves between
// threads as a whole.
unsafe impl Send for StreamHolder {}

/// Counters shared with the device callback
#[derive(Debug, Default)]
struct DeviceCounters {
    underruns: AtomicU64,
    overruns: AtomicU64,
    stream_error: AtomicBool,
}

/// Device statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    /// Frames the device played as silence because the ring was empty
    pub underruns: u64,

    /// Samples dropped because the ring was full
    pub overruns: u64,

    /// The device reported a stream error
    pub stream_error: bool,
}

/// Output device destination
pub struct DeviceDestination {
    requested_device: Option<String>,
    sample_rate: u32,
    buffer_size: usize,
    producer: Option<ringbuf::HeapProd<f32>>,
    stream: Option<StreamHolder>,
    counters: Arc<DeviceCounters>,
    device_name: Option<String>,
}

impl DeviceDestination {
    /// Destination for `device_name` (None = system default) at `sample_rate`
    ///
    /// The device is opened on `connect`, not here.
    pub fn new(device_name: Option<String>, sample_rate: u32, buffer_size: usize) -> Self {
        Self {
            requested_device: device_name,
            sample_rate,
            buffer_size,
            producer: None,
            stream: None,
            counters: Arc::new(DeviceCounters::default()),
            device_name: None,
        }
    }

    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            underruns: self.counters.underruns.load(Ordering::Relaxed),
            overruns: self.counters.overruns.load(Ordering::Relaxed),
            stream_error: self.counters.stream_error.load(Ordering::Relaxed),
        }
    }

    /// Find the requested device, falling back to the default device
    fn open_device(&self) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = self.requested_device.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        host.default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
    }

    /// Pick a supported configuration running at the sink's sample rate
    ///
    /// Prefers f32, then the fewest channels.
    fn select_config(&self, device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let rate = cpal::SampleRate(self.sample_rate);
        let mut candidates: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .collect();

        candidates.sort_by_key(|c| (c.sample_format() != SampleFormat::F32, c.channels()));

        let supported = candidates.into_iter().next().ok_or_else(|| {
            Error::AudioOutput(format!(
                "Device does not support {}Hz output",
                self.sample_rate
            ))
        })?;

        let sample_format = supported.sample_format();
        Ok((supported.with_sample_rate(rate).config(), sample_format))
    }

    fn build_stream<T>(
        &self,
        device: &Device,
        config: &StreamConfig,
        mut consumer: ringbuf::HeapCons<f32>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels.max(1) as usize;
        let counters = Arc::clone(&self.counters);
        let error_counters = Arc::clone(&self.counters);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut starved = 0u64;
                    for frame in data.chunks_mut(channels) {
                        let sample = consumer.try_pop().unwrap_or_else(|| {
                            starved += 1;
                            0.0
                        });
                        let value = T::from_sample(sample.clamp(-1.0, 1.0));
                        frame.fill(value);
                    }
                    if starved > 0 {
                        counters.underruns.fetch_add(starved, Ordering::Relaxed);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_counters.stream_error.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

impl Destination for DeviceDestination {
    fn name(&self) -> String {
        let name = self
            .device_name
            .as_deref()
            .or(self.requested_device.as_deref())
            .unwrap_or("default");
        format!("device:{}", name)
    }

    fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let device = self.open_device()?;
        let (config, sample_format) = self.select_config(&device)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let ring = HeapRb::<f32>::new(self.buffer_size.max(1) * RING_BLOCKS);
        let (mut producer, consumer) = ring.split();

        // One block of silence as headroom against delivery jitter
        producer.push_slice(&vec![0.0f32; self.buffer_size.max(1)]);

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&device, &config, consumer)?,
            SampleFormat::I16 => self.build_stream::<i16>(&device, &config, consumer)?,
            SampleFormat::U16 => self.build_stream::<u16>(&device, &config, consumer)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!(
            "Audio device '{}' started: {}Hz, {} channel(s), {:?}",
            device_name, config.sample_rate.0, config.channels, sample_format
        );

        self.device_name = Some(device_name);
        self.producer = Some(producer);
        self.stream = Some(StreamHolder(stream));
        Ok(())
    }

    fn write(&mut self, block: &[f32]) {
        let Some(producer) = self.producer.as_mut() else {
            return;
        };
        let pushed = producer.push_slice(block);
        if pushed < block.len() {
            let dropped = (block.len() - pushed) as u64;
            let total = self.counters.overruns.fetch_add(dropped, Ordering::Relaxed) + dropped;
            warn!("Audio ring full, dropped {} samples (total: {})", dropped, total);
        }
    }

    /// Block until the device has consumed everything in the ring
    ///
    /// Bounded by the ring's playing time plus a small slack; a device that
    /// reported a stream error is not waited on.
    fn drain(&mut self) {
        let Some(producer) = self.producer.as_ref() else {
            return;
        };
        if self.stream.is_none() || self.counters.stream_error.load(Ordering::SeqCst) {
            return;
        }

        let pending = producer.occupied_len();
        if pending == 0 {
            return;
        }

        let rate = self.sample_rate.max(1) as f64;
        let timeout = Duration::from_secs_f64(pending as f64 / rate) + DRAIN_SLACK;
        if wait_until_drained(|| producer.is_empty(), timeout) {
            // The last samples popped are still in the device's own buffer
            thread::sleep(Duration::from_secs_f64(self.buffer_size as f64 / rate).min(DRAIN_SLACK));
            debug!("Audio ring drained ({} samples)", pending);
        } else {
            warn!(
                "Audio ring did not drain within {:?}, {} samples left",
                timeout,
                producer.occupied_len()
            );
        }
    }

    fn disconnect(&mut self) {
        if let Some(StreamHolder(stream)) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause stream: {}", e);
            }
            drop(stream);
            let stats = self.stats();
            info!(
                "Audio device stopped (underrun frames: {}, dropped samples: {})",
                stats.underruns, stats.overruns
            );
        }
        self.producer = None;
    }
}

impl Drop for DeviceDestination {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_before_connect_is_ignored() {
        let mut dest = DeviceDestination::new(None, 22050, 256);
        dest.write(&[0.5; 16]);
        assert_eq!(
            dest.stats(),
            DeviceStats {
                underruns: 0,
                overruns: 0,
                stream_error: false
            }
        );
        assert_eq!(dest.name(), "device:default");
    }

    #[test]
    fn test_drain_without_connect_returns_immediately() {
        let mut dest = DeviceDestination::new(None, 22050, 4096);
        let started = Instant::now();
        dest.drain();
        assert!(started.elapsed() < DRAIN_SLACK);
    }

    #[test]
    fn test_wait_until_drained_sees_consumer_progress() {
        let ring = HeapRb::<f32>::new(64);
        let (mut producer, mut consumer) = ring.split();
        producer.push_slice(&[0.5; 48]);

        let consumer_thread = thread::spawn(move || {
            while consumer.try_pop().is_some() {
                thread::sleep(Duration::from_micros(100));
            }
        });

        assert!(wait_until_drained(|| producer.is_empty(), Duration::from_secs(5)));
        consumer_thread.join().unwrap();
    }

    #[test]
    fn test_wait_until_drained_times_out() {
        let mut polls = 0;
        let drained = wait_until_drained(
            || {
                polls += 1;
                false
            },
            Duration::from_millis(10),
        );
        assert!(!drained);
        assert!(polls >= 2);
    }

    #[test]
    fn test_disconnect_without_connect_is_noop() {
        let mut dest = DeviceDestination::new(Some("Missing Device".to_string()), 22050, 256);
        dest.disconnect();
        dest.disconnect();
        assert_eq!(dest.name(), "device:Missing Device");
    }
}
