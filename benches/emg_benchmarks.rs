use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emg_myocontrol::acquisition::VersionedRingBuffer;
use emg_myocontrol::control::{SequentialController, SetpointConditioner};
use emg_myocontrol::config::SetpointConfig;
use emg_myocontrol::hal::frame::{decode_interleaved, encode_interleaved};
use emg_myocontrol::hal::ChannelBlock;
use emg_myocontrol::processing::filters::{FilterSpec, ZeroPhaseFilter};
use emg_myocontrol::processing::SignalConditioner;
use ndarray::Array2;
use std::sync::Arc;
use std::thread;

const SAMPLE_RATE_HZ: f64 = 2000.0;
const TARGET_RATE_HZ: f64 = 33.3;
const CHANNEL_COUNTS: &[usize] = &[1, 2, 4, 8, 16];
const BLOCK_SIZES: &[usize] = &[1000, 2000, 4000];

fn test_block(channels: usize, samples: usize) -> ChannelBlock {
    let data = Array2::from_shape_fn((channels, samples), |(c, i)| {
        let t = i as f64 / SAMPLE_RATE_HZ;
        (2.0 * std::f64::consts::PI * (80.0 + 10.0 * c as f64) * t).sin() * 0.3
    });
    ChannelBlock::new(data, SAMPLE_RATE_HZ, 0)
}

fn benchmark_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");

    for &capacity in &[4usize, 16, 64] {
        group.throughput(Throughput::Elements(1000));

        group.bench_with_input(BenchmarkId::new("push", capacity), &capacity, |b, &size| {
            let buffer = VersionedRingBuffer::new(size).unwrap();
            b.iter(|| {
                for i in 0..1000u64 {
                    buffer.push(black_box(i));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("try_latest", capacity), &capacity, |b, &size| {
            let buffer = VersionedRingBuffer::new(size).unwrap();
            for i in 0..size as u64 {
                buffer.push(i);
            }
            b.iter(|| {
                for _ in 0..1000 {
                    black_box(buffer.try_latest());
                }
            });
        });
    }

    // One block-sized payload through a concurrent writer
    group.throughput(Throughput::Elements(100));
    group.bench_function("contended_block_push", |b| {
        let buffer = Arc::new(VersionedRingBuffer::new(16).unwrap());
        let block = test_block(2, 2000);
        b.iter(|| {
            let writer = {
                let buffer = Arc::clone(&buffer);
                let block = block.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        buffer.push(block.clone());
                    }
                })
            };
            let mut last_seen = buffer.sequence();
            for _ in 0..10 {
                if let Some(latest) = buffer.try_latest() {
                    last_seen = last_seen.max(latest.sequence);
                }
            }
            writer.join().unwrap();
            black_box(last_seen)
        });
    });

    group.finish();
}

fn benchmark_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for &samples in BLOCK_SIZES {
        let frame = Array2::from_shape_fn((16, samples), |(c, i)| (c * i) as f64 * 1e-4);
        let bytes = encode_interleaved(&frame);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("16ch", samples), &bytes, |b, bytes| {
            b.iter(|| decode_interleaved(black_box(bytes), 16, samples).unwrap());
        });
    }

    group.finish();
}

fn benchmark_conditioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditioning");

    let filter = ZeroPhaseFilter::design(&FilterSpec::lowpass(4, 10.0), TARGET_RATE_HZ).unwrap();
    let decimated: Vec<f64> = (0..66).map(|i| (i as f64 * 0.3).sin()).collect();
    group.bench_function("filtfilt_66", |b| {
        b.iter(|| filter.apply(black_box(&decimated)).unwrap());
    });

    let conditioner =
        SignalConditioner::new(SAMPLE_RATE_HZ, TARGET_RATE_HZ, 120.0, &FilterSpec::default()).unwrap();
    for &channels in CHANNEL_COUNTS {
        for &samples in BLOCK_SIZES {
            let block = test_block(channels, samples);
            group.throughput(Throughput::Elements((channels * samples) as u64));
            group.bench_with_input(
                BenchmarkId::new("block", format!("{}ch_{}", channels, samples)),
                &block,
                |b, block| {
                    b.iter(|| conditioner.condition(black_box(block)).unwrap());
                },
            );
        }
    }

    group.finish();
}

fn benchmark_control(c: &mut Criterion) {
    let mut group = c.benchmark_group("control");

    let primary: Vec<f64> = (0..1000).map(|i| 4.0 + 3.0 * (i as f64 * 0.05).sin()).collect();
    let secondary: Vec<f64> = (0..1000).map(|i| 4.0 + 3.0 * (i as f64 * 0.07).cos()).collect();
    let shaper = SetpointConditioner::new(SetpointConfig::default()).unwrap();

    group.throughput(Throughput::Elements(1000));
    group.bench_function("sequential_1000", |b| {
        let mut controller = SequentialController::new(3.0, 1.0).unwrap();
        b.iter(|| controller.process(black_box(&primary), black_box(&secondary)).unwrap());
    });

    group.bench_function("sequential_and_setpoints_1000", |b| {
        let mut controller = SequentialController::new(3.0, 1.0).unwrap();
        b.iter(|| {
            let signals = controller.process(&primary, &secondary).unwrap();
            black_box(shaper.condition(&signals))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_ring_buffer,
    benchmark_frame_decode,
    benchmark_conditioning,
    benchmark_control
);
criterion_main!(benches);
