//! Store and decoder throughput benchmarks.

use std::sync::Arc;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use voltage_sample::bitfield::{decode_bits, BitOrigin};
use voltage_sample::{
    ByteOrder, CanId, FrameRecord, FrameStore, ModelDiscovery, RegisterImage, RegisterPoller,
    RegisterRange, RegisterStore, SignalReference,
};

const PAYLOAD: [u8; 8] = [0x32, 0x15, 0xDC, 0x1A, 0x3D, 0x07, 0x65, 0x38];

fn bench_bit_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit_decode");
    for order in [ByteOrder::BigEndian, ByteOrder::BigEndianSwap] {
        group.bench_function(format!("unaligned_13_bits_{}", order), |b| {
            b.iter(|| {
                decode_bits(
                    black_box(&PAYLOAD),
                    black_box(5),
                    13,
                    order,
                    true,
                    BitOrigin::LeastSignificant,
                )
            })
        });
    }
    group.bench_function("aligned_64_bits", |b| {
        b.iter(|| {
            decode_bits(
                black_box(&PAYLOAD),
                0,
                64,
                ByteOrder::BigEndian,
                false,
                BitOrigin::LeastSignificant,
            )
        })
    });
    group.finish();
}

fn bench_register_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_store");

    for size in [100usize, 1_000, 10_000] {
        let words: Vec<u16> = (0..size as u16).collect();
        group.bench_function(format!("update_{}_words", size), |b| {
            b.iter_batched(
                RegisterStore::new,
                |store| store.update(|m| Ok(m.save_words(0, black_box(&words)))),
                BatchSize::SmallInput,
            );
        });
    }

    let store = RegisterStore::new();
    let words: Vec<u16> = (0..1_000).collect();
    let _ = store.update(|m| Ok(m.save_words(40000, &words)));
    let signal = SignalReference::register(40100, 32)
        .map(|s| s.with_byte_order(ByteOrder::BigEndianSwap))
        .ok();
    group.bench_function("decode_u32_signal", |b| {
        b.iter(|| signal.as_ref().map(|s| store.decode(black_box(s))))
    });
    group.bench_function("snapshot", |b| b.iter(|| store.snapshot()));
    group.finish();
}

fn bench_frame_store(c: &mut Criterion) {
    let frames: Vec<FrameRecord> = (0..256u16)
        .filter_map(|id| FrameRecord::new(CanId::Standard(id), PAYLOAD.to_vec(), Utc::now()).ok())
        .collect();
    c.bench_function("frame_store_record_256", |b| {
        b.iter_batched(
            || frames.clone(),
            |batch| FrameStore::new().record(batch),
            BatchSize::SmallInput,
        );
    });
}

fn bench_poll_and_discover(c: &mut Criterion) {
    let body: Vec<u16> = (0..50).collect();
    let device = RegisterImage::new()
        .with_holding(40000, &[0x5375, 0x6E53])
        .with_holding(40002, &[103, 50])
        .with_holding(40004, &body)
        .with_holding(40054, &[0xFFFF, 0]);

    c.bench_function("discover_one_model", |b| {
        b.iter_batched(
            || (device.clone(), RegisterStore::new()),
            |(mut dev, store)| ModelDiscovery::new(1).discover(&mut dev, &store),
            BatchSize::SmallInput,
        );
    });

    let poller = RegisterPoller::new(device, Arc::new(RegisterStore::new()));
    let ranges = [RegisterRange::holding(1, 40004, 20), RegisterRange::holding(1, 40030, 20)];
    c.bench_function("refresh_two_ranges", |b| b.iter(|| poller.refresh(black_box(&ranges))));
}

criterion_group!(
    benches,
    bench_bit_decode,
    bench_register_store,
    bench_frame_store,
    bench_poll_and_discover
);
criterion_main!(benches);
