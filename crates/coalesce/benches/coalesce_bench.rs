//! Benchmarks for the coalescing write path.
//!
//! Run with: cargo bench --package alopex-coalesce
//!
//! ## Benchmark Categories
//!
//! - **Deferred Writes**: buffering cost of small writes, inline flush cost
//! - **Blocking Writes**: round trip through the flush worker
//! - **Baseline**: the same writes issued straight to the sink

use alopex_coalesce::{BlockingCoalescer, DeferredCoalescer, Sink};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Sink that simulates a fixed per-call cost, like a syscall or packet.
#[derive(Clone)]
struct CostlySink {
    calls: Arc<AtomicU64>,
    per_call: Duration,
}

impl CostlySink {
    fn new(per_call: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicU64::new(0)),
            per_call,
        }
    }
}

impl Sink for CostlySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.per_call.is_zero() {
            thread::sleep(self.per_call);
        }
        Ok(buf.len())
    }
}

fn bench_deferred_small_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("deferred_small_writes");
    let payload = [b'x'; 64];

    for max_size in [1024usize, 16 * 1024, 256 * 1024] {
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(max_size),
            &max_size,
            |b, &max_size| {
                let coalescer = DeferredCoalescer::with_params(
                    CostlySink::new(Duration::ZERO),
                    Duration::from_millis(1),
                    max_size,
                )
                .unwrap();
                b.iter(|| coalescer.write(black_box(&payload)).unwrap());
                coalescer.close().unwrap();
            },
        );
    }

    group.finish();
}

fn bench_direct_small_writes(c: &mut Criterion) {
    let payload = [b'x'; 64];
    let mut sink = CostlySink::new(Duration::ZERO);

    c.bench_function("direct_small_writes", |b| {
        b.iter(|| sink.write(black_box(&payload)).unwrap())
    });
}

/// Many threads writing through one blocking coalescer to a sink that costs
/// 50µs per call.
fn bench_blocking_concurrent_writers(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_concurrent_writers");
    group.sample_size(20);

    for writers in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(writers as u64 * 32));
        group.bench_with_input(BenchmarkId::from_parameter(writers), &writers, |b, &writers| {
            let coalescer = Arc::new(
                BlockingCoalescer::with_params(
                    CostlySink::new(Duration::from_micros(50)),
                    Duration::from_micros(100),
                    64 * 1024,
                )
                .unwrap(),
            );

            b.iter(|| {
                let handles: Vec<_> = (0..writers)
                    .map(|_| {
                        let coalescer = Arc::clone(&coalescer);
                        thread::spawn(move || {
                            for _ in 0..32 {
                                coalescer.write(black_box(b"0123456789abcdef")).unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });

            coalescer.close().unwrap();
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deferred_small_writes,
    bench_direct_small_writes,
    bench_blocking_concurrent_writers,
);
criterion_main!(benches);
