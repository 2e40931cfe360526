//! Enhancement pipeline and sink delivery benchmarks
//!
//! **Goal:** a finished utterance must be processed much faster than it plays
//! **Target:** >20x realtime for the full enhancement pipeline
//!
//! Also measures one delivery invocation of the streaming sink, which has to
//! fit comfortably inside one buffer period.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::f32::consts::PI;
use std::time::Instant;
use voxpush_player::dsp::{EnhancementPipeline, Limiter, NoiseGate, PipelineParams, Stage};
use voxpush_player::playback::{Destination, ManualDriver, StreamingSink};
use voxpush_player::Result;

const SAMPLE_RATE: u32 = 22050;

/// Five seconds of tone bursts with quiet gaps
fn utterance() -> Vec<f32> {
    let len = SAMPLE_RATE as usize * 5;
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            if (i / 2205) % 3 == 2 {
                0.003 * (2.0 * PI * 60.0 * t).sin()
            } else {
                0.5 * (2.0 * PI * 180.0 * t).sin() + 0.1 * (2.0 * PI * 3000.0 * t).sin()
            }
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let input = utterance();
    let duration_s = input.len() as f64 / SAMPLE_RATE as f64;
    let mut group = c.benchmark_group("enhancement_pipeline");

    for enhance in [true, false] {
        let pipeline = EnhancementPipeline::new(PipelineParams {
            volume: 1.0,
            enhance,
        });
        let name = if enhance { "full" } else { "mastering_only" };

        group.bench_function(BenchmarkId::new("process_5s", name), |b| {
            b.iter(|| {
                let start = Instant::now();
                let output = pipeline.process(black_box(&input));
                let realtime_factor = duration_s / start.elapsed().as_secs_f64();
                if realtime_factor < 20.0 {
                    eprintln!(
                        "WARNING: {} pipeline at {:.1}x is below 20x realtime target",
                        name, realtime_factor
                    );
                }
                black_box(output);
            });
        });
    }

    group.finish();
}

fn bench_look_ahead_stages(c: &mut Criterion) {
    let input = utterance();
    let mut group = c.benchmark_group("look_ahead");

    group.bench_function("noise_gate", |b| {
        let gate = NoiseGate::default();
        b.iter(|| black_box(gate.process(black_box(&input))));
    });
    group.bench_function("limiter", |b| {
        let limiter = Limiter::default();
        b.iter(|| black_box(limiter.process(black_box(&input))));
    });

    group.finish();
}

/// Destination that drops every block
struct Discard;

impl Destination for Discard {
    fn name(&self) -> String {
        "discard".to_string()
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, block: &[f32]) {
        black_box(block);
    }

    fn disconnect(&mut self) {}
}

fn bench_sink_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("sink_delivery");

    for buffer_size in [256usize, 1024, 4096] {
        group.bench_with_input(
            BenchmarkId::new("tick", buffer_size),
            &buffer_size,
            |b, &buffer_size| {
                let driver = ManualDriver::new(SAMPLE_RATE, buffer_size);
                let sink = StreamingSink::new(SAMPLE_RATE, buffer_size, driver.clone()).unwrap();
                sink.connect(Discard).unwrap();
                let chunk = vec![0.25f32; buffer_size];

                b.iter(|| {
                    sink.push(chunk.clone()).unwrap();
                    black_box(driver.tick());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pipeline,
    bench_look_ahead_stages,
    bench_sink_delivery
);
criterion_main!(benches);
