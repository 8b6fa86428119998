// Admission and Fan-out Benchmarks (Criterion)
//
// Key metrics measured:
// - Request admission against a warm rolling window
// - Connection slot acquire/release
// - Dispatch of one change event to N subscribers
//
// Usage:
//   cargo bench --bench admission

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use swearjar::broadcast::{BroadcastPipeline, ChangeEvent};
use swearjar::cost::PriceMultiplier;
use swearjar::rate_limit::{RateLimitConfig, RateLimiter};
use swearjar::registry::{delivery_channel, ConnectionRegistry};

/// Benchmark: request admission with a full window
fn bench_admit_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("admit_request");

    for identities in [1usize, 100, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(identities),
            &identities,
            |b, &identities| {
                let limiter = RateLimiter::new(RateLimitConfig {
                    request_limit: 30,
                    window_ms: 60_000,
                    ..RateLimitConfig::default()
                });
                let names: Vec<String> = (0..identities).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
                let mut now = 0u64;
                let mut next = 0usize;
                b.iter(|| {
                    now += 1;
                    next = (next + 1) % names.len();
                    black_box(limiter.admit_request_at(&names[next], now));
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: connection slot round trip
fn bench_connection_slots(c: &mut Criterion) {
    let limiter = RateLimiter::default_config();
    c.bench_function("connection_slot_round_trip", |b| {
        b.iter(|| {
            let admitted = limiter.admit_connection(black_box("10.0.0.1"));
            limiter.release_connection("10.0.0.1");
            black_box(admitted);
        });
    });
}

/// Benchmark: fan-out of one event
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for subscribers in [1usize, 10, 100, 1_000] {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            connection_limit: u32::MAX,
            ..RateLimitConfig::default()
        }));
        let registry = Arc::new(ConnectionRegistry::new(limiter));
        let price = PriceMultiplier::new(0.25).unwrap();

        let mut streams = Vec::with_capacity(subscribers);
        for _ in 0..subscribers {
            let (handle, stream) = delivery_channel();
            registry.admit("bench", price, handle).unwrap();
            streams.push(stream);
        }
        let pipeline = BroadcastPipeline::new(Arc::clone(&registry));

        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    black_box(pipeline.dispatch(&ChangeEvent::new(42)).unwrap());
                    for stream in streams.iter_mut() {
                        while stream.try_recv().is_ok() {}
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_admit_request, bench_connection_slots, bench_dispatch);
criterion_main!(benches);
