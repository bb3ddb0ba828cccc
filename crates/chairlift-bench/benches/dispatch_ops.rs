//! Criterion benchmarks for chair batching and a full resort run.

use std::time::Duration;

use chairlift_bench::{boarding_stream, reference_profile};
use chairlift_engine::{Admission, PendingBatch, Resort, RiderProfile};
use chairlift_test_utils::spawn_riders;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Batch a request stream the way the dispatcher does, without any IPC.
fn bench_batch_admission(c: &mut Criterion) {
    let stream = boarding_stream(1024, 42);
    c.bench_function("batch_admit_1024", |b| {
        b.iter(|| {
            let mut batch = PendingBatch::new();
            let mut chairs = 0u32;
            for (_, request) in &stream {
                match batch.try_admit(*request) {
                    Admission::Buffered => {}
                    Admission::Full => {
                        black_box(batch.take());
                        chairs += 1;
                    }
                    Admission::Rejected(request) => {
                        black_box(batch.take());
                        chairs += 1;
                        let _ = batch.try_admit(request);
                    }
                }
            }
            black_box(chairs)
        });
    });
}

/// Start a resort, push 16 riders through one ride each, shut down.
fn bench_resort_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("resort");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("round_trip_16_riders", |b| {
        b.iter(|| {
            let mut resort = Resort::start(reference_profile(42)).unwrap();
            let riders = spawn_riders(resort.substrate(), (0..16).map(RiderProfile::walker), 1);
            for rider in riders {
                black_box(rider.join().unwrap());
            }
            black_box(resort.shutdown())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_batch_admission, bench_resort_round_trip);
criterion_main!(benches);
