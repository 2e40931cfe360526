//! voxpush - speech playback and enhancement tool
//!
//! Replays recorded utterances through the synthesis boundary, either
//! streaming them to an output device in real time or post-processing them
//! with the enhancement pipeline.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxpush_common::config::{resolve_config_path, SpeakOverrides, TomlConfig};
use voxpush_player::audio::wav::{read_wav, write_wav};
use voxpush_player::audio::DeviceDestination;
use voxpush_player::playback::{StreamingSink, ThreadDriver, WavDestination};
use voxpush_player::synthesis::{play_buffer, ReplayEngine, Speaker, SynthesisWorker};

/// Samples per chunk when replaying a recording through the synthesis worker
const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Command-line arguments for voxpush
#[derive(Parser, Debug)]
#[command(name = "voxpush")]
#[command(about = "Real-time speech playback and enhancement")]
#[command(version)]
struct Args {
    /// Config file (overrides VOXPUSH_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "VOXPUSH_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a recorded utterance through the enhancement pipeline
    Enhance {
        input: PathBuf,
        output: PathBuf,

        /// Normalization gain multiplier
        #[arg(long)]
        volume: Option<f32>,

        /// Skip pre-emphasis, noise gate, spectral enhancement and de-esser
        #[arg(long)]
        no_enhance: bool,

        /// Add reverb to the processed utterance
        #[arg(long)]
        reverb: bool,

        /// Chunk size used when replaying the recording
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Stream a recorded utterance to the output device in real time
    Play {
        input: PathBuf,

        /// Samples per delivery invocation
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Output device name
        #[arg(long, env = "VOXPUSH_DEVICE")]
        device: Option<String>,

        /// Also write everything delivered to this WAV file
        #[arg(long)]
        record: Option<PathBuf>,

        /// Text of the recording; its words are logged as playback reaches them
        #[arg(long, default_value = "")]
        text: String,

        /// Enhance the whole utterance first, then play the result
        #[arg(long)]
        processed: bool,

        /// Chunk size used when replaying the recording
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// List audio output devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(args.log_level.as_deref().unwrap_or(&config.logging.level));

    info!(
        "voxpush {} (git {}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("VOXPUSH_GIT_HASH"),
        env!("VOXPUSH_BUILD_PROFILE"),
        env!("VOXPUSH_BUILD_TIMESTAMP")
    );
    match config_path.as_ref() {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    match args.command {
        Command::Enhance {
            input,
            output,
            volume,
            no_enhance,
            reverb,
            chunk_size,
        } => {
            let overrides = SpeakOverrides {
                volume,
                enhance: no_enhance.then_some(false),
                reverb: reverb.then_some(true),
                ..SpeakOverrides::default()
            };
            enhance(&config, &input, &output, &overrides, chunk_size).await
        }
        Command::Play {
            input,
            buffer_size,
            device,
            record,
            text,
            processed,
            chunk_size,
        } => {
            let options = PlayOptions {
                buffer_size: buffer_size.unwrap_or(config.stream.buffer_size),
                device: device.or_else(|| config.stream.device.clone()),
                record,
                text,
                processed,
                chunk_size,
            };
            play(&config, &input, options).await
        }
        Command::Devices => {
            let devices = DeviceDestination::list_devices().context("Failed to list devices")?;
            for device in devices {
                println!("{}", device);
            }
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    let fallback = format!(
        "voxpush={level},voxpush_player={level},voxpush_common={level}",
        level = level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Spawn a worker that replays `path` as if it were being synthesized
fn replay_speaker(config: &TomlConfig, path: &Path, chunk_size: usize) -> Result<(Speaker, u32)> {
    let recording =
        read_wav(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let sample_rate = recording.sample_rate;
    info!(
        "Loaded {} ({:.2}s @ {}Hz)",
        path.display(),
        recording.duration_seconds(),
        sample_rate
    );

    let worker = SynthesisWorker::spawn(move || Ok(ReplayEngine::from_buffer(recording, chunk_size)))
        .context("Failed to start synthesis worker")?;
    Ok((Speaker::new(worker, config.speech.clone()), sample_rate))
}

async fn shutdown_speaker(speaker: Speaker) {
    if let Err(e) = tokio::task::spawn_blocking(move || speaker.shutdown()).await {
        warn!("Synthesis worker shutdown failed: {}", e);
    }
}

async fn enhance(
    config: &TomlConfig,
    input: &Path,
    output: &Path,
    overrides: &SpeakOverrides,
    chunk_size: usize,
) -> Result<()> {
    let (speaker, _) = replay_speaker(config, input, chunk_size)?;

    let processed = speaker
        .speak("", overrides)
        .await
        .context("Synthesis produced no audio")?;
    write_wav(output, &processed)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote {} ({} samples, peak {:.3})",
        output.display(),
        processed.len(),
        processed.peak()
    );
    shutdown_speaker(speaker).await;
    Ok(())
}

struct PlayOptions {
    buffer_size: usize,
    device: Option<String>,
    record: Option<PathBuf>,
    text: String,
    processed: bool,
    chunk_size: usize,
}

async fn play(config: &TomlConfig, input: &Path, options: PlayOptions) -> Result<()> {
    let (speaker, sample_rate) = replay_speaker(config, input, options.chunk_size)?;
    if sample_rate != config.stream.sample_rate {
        warn!(
            "Recording is {}Hz, configured stream rate is {}Hz; using the recording's rate",
            sample_rate, config.stream.sample_rate
        );
    }

    let (done_tx, done_rx) = oneshot::channel::<f64>();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));
    let sink = StreamingSink::builder(sample_rate, options.buffer_size)
        .on_start(|| info!("Playback started"))
        .on_end(move |elapsed| {
            let sender = done_tx.lock().ok().and_then(|mut slot| slot.take());
            if let Some(sender) = sender {
                let _ = sender.send(elapsed);
            }
        })
        .build(ThreadDriver::new(sample_rate, options.buffer_size))
        .context("Failed to create streaming sink")?;

    sink.connect(DeviceDestination::new(
        options.device.clone(),
        sample_rate,
        options.buffer_size,
    ))?;
    if let Some(path) = options.record.as_ref() {
        sink.connect(WavDestination::new(path, sample_rate))?;
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<voxpush_common::SynthesisEvent>();
    let text = options.text.clone();
    let event_logger = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let word = text
                .get(event.text_position..event.text_position + event.length)
                .unwrap_or("");
            info!(
                "[{:>7.3}s] {} {}",
                event.audio_position_secs(),
                event.kind,
                word
            );
        }
    });

    if options.processed {
        let buffer = speaker
            .speak(&options.text, &SpeakOverrides::default())
            .await
            .context("Synthesis produced no audio")?;
        play_buffer(&buffer, &sink).context("Failed to start playback")?;
        drop(event_tx);
    } else {
        let report = speaker
            .stream(&options.text, &SpeakOverrides::default(), &sink, Some(event_tx))
            .await
            .context("Streaming failed")?;
        info!(
            "Queued {} chunks ({} samples, {} events)",
            report.chunks, report.samples, report.events
        );
    }

    tokio::select! {
        elapsed = done_rx => {
            match elapsed {
                Ok(elapsed) => info!("Playback finished after {:.2}s", elapsed),
                Err(_) => warn!("Sink dropped before playback finished"),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping playback");
            sink.disconnect();
        }
    }

    // Pending track callbacks hold event senders; disconnect releases them
    sink.disconnect();
    let _ = event_logger.await;
    shutdown_speaker(speaker).await;
    Ok(())
}
