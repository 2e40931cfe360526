//! Enhancement pipeline integration tests
//!
//! Whole-pipeline behaviour on speech-like material, plus the stage
//! properties callers rely on.

mod helpers;

use std::f32::consts::PI;

use helpers::harness::TEST_SAMPLE_RATE;
use helpers::{sine, speech_like, write_wav_fixture};
use voxpush_player::audio::wav::{read_wav, write_wav};
use voxpush_player::dsp::{
    merge_chunks, Compressor, EnhancementPipeline, Limiter, Normalizer, PipelineParams, Reverb,
    Stage,
};
use voxpush_player::SampleChunk;

const BURST: usize = 4410;

/// 200Hz bursts separated by gaps holding only a faint 50Hz hum
fn bursts_with_hum(bursts: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(bursts * BURST * 2);
    for _ in 0..bursts {
        samples.extend(sine(200.0, 0.5, BURST, TEST_SAMPLE_RATE));
        samples.extend((0..BURST).map(|i| {
            0.001 * (2.0 * PI * 50.0 * i as f32 / TEST_SAMPLE_RATE as f32 + 0.3).sin()
        }));
    }
    samples
}

fn gap_middle(burst_index: usize) -> std::ops::Range<usize> {
    let gap_start = burst_index * 2 * BURST + BURST;
    gap_start + 1000..gap_start + BURST - 1000
}

#[test]
fn test_enhancement_gates_hum_between_bursts() {
    let input = bursts_with_hum(3);

    let enhanced = EnhancementPipeline::new(PipelineParams {
        volume: 1.0,
        enhance: true,
    })
    .process(&input);
    let plain = EnhancementPipeline::new(PipelineParams {
        volume: 1.0,
        enhance: false,
    })
    .process(&input);

    for burst in 0..3 {
        assert!(
            enhanced[gap_middle(burst)].iter().all(|&s| s == 0.0),
            "gap {} should be gated",
            burst
        );
        assert!(plain[gap_middle(burst)].iter().any(|&s| s != 0.0));
    }
}

#[test]
fn test_output_length_and_ceiling() {
    let input = speech_like(TEST_SAMPLE_RATE as usize * 2, TEST_SAMPLE_RATE);
    for enhance in [true, false] {
        for volume in [0.5, 1.0, 3.0] {
            let output = EnhancementPipeline::new(PipelineParams { volume, enhance }).process(&input);
            assert_eq!(output.len(), input.len());
            assert!(
                output.iter().all(|s| s.abs() <= 0.99),
                "enhance {} volume {}",
                enhance,
                volume
            );
        }
    }
}

#[test]
fn test_higher_volume_is_louder() {
    let input = speech_like(TEST_SAMPLE_RATE as usize, TEST_SAMPLE_RATE);
    let rms = |samples: &[f32]| {
        (samples.iter().map(|s| (*s as f64).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
    };

    let quiet = EnhancementPipeline::new(PipelineParams { volume: 0.3, enhance: true }).process(&input);
    let loud = EnhancementPipeline::new(PipelineParams { volume: 0.9, enhance: true }).process(&input);
    assert!(rms(&loud) > rms(&quiet) * 2.0);
}

#[test]
fn test_normalization_linear_in_volume() {
    let input = speech_like(8192, TEST_SAMPLE_RATE);
    let once = Normalizer::with_volume(0.4).process(&input);
    let twice = Normalizer::with_volume(0.8).process(&input);

    for (a, b) in once.iter().zip(twice.iter()) {
        assert!((b - 2.0 * a).abs() <= 1e-6, "{} vs {}", a, b);
    }
}

#[test]
fn test_limiting_idempotent_within_threshold() {
    let input: Vec<f32> = speech_like(6000, TEST_SAMPLE_RATE)
        .into_iter()
        .map(|s| s * 1.5)
        .collect();
    assert!(input.iter().all(|s| s.abs() <= 0.95));

    let once = Limiter::default().process(&input);
    let twice = Limiter::default().process(&once);
    assert_eq!(once, twice);
}

#[test]
fn test_compression_of_silence_is_silence() {
    assert_eq!(Compressor::default().process(&vec![0.0; 4096]), vec![0.0; 4096]);
}

#[test]
fn test_chunked_and_whole_input_match() {
    let input = speech_like(5000, TEST_SAMPLE_RATE);
    let chunks: Vec<SampleChunk> = input.chunks(777).map(SampleChunk::from).collect();

    let merged = merge_chunks(chunks.clone(), TEST_SAMPLE_RATE);
    assert_eq!(merged.samples, input);

    let pipeline = EnhancementPipeline::default();
    assert_eq!(
        pipeline.process_chunks(chunks, TEST_SAMPLE_RATE).samples,
        pipeline.process(&input)
    );
}

#[test]
fn test_recording_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("utterance.wav");
    let output_path = dir.path().join("enhanced.wav");

    write_wav_fixture(&input_path, &speech_like(11025, TEST_SAMPLE_RATE), TEST_SAMPLE_RATE).unwrap();
    let recording = read_wav(&input_path).unwrap();
    assert_eq!(recording.len(), 11025);

    let processed = EnhancementPipeline::default().process_buffer(&recording);
    let processed = processed.with_samples(Reverb::new(TEST_SAMPLE_RATE).process(&processed.samples));
    write_wav(&output_path, &processed).unwrap();

    let reread = read_wav(&output_path).unwrap();
    assert_eq!(reread.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(reread.samples, processed.samples);
}
