use brush_stylize::engine::memory::estimate_working_set;
use brush_stylize::engine::{SizePolicy, WeightedSemaphore};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;
use std::thread;

// Each thread repeatedly takes and drops a permit of `weight(thread)` bytes.
fn hammer(iterations: usize, threads: usize, capacity: u64, weight: impl Fn(usize) -> u64) {
    let sem = Arc::new(WeightedSemaphore::new(capacity));
    let mut handles = Vec::with_capacity(threads);
    for t in 0..threads {
        let sem = Arc::clone(&sem);
        let w = weight(t);
        handles.push(thread::spawn(move || {
            for _ in 0..iterations {
                let permit = sem.acquire(w);
                drop(permit);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}

fn bench_contention(c: &mut Criterion) {
    // 64 threads × 2_000 iterations = 128k acquire/release pairs
    let iterations = 2_000;
    let threads = 64;

    c.bench_function("uniform_weights", |b| {
        b.iter_batched(
            || (),
            |_| hammer(iterations, threads, threads as u64, |_| 1),
            BatchSize::SmallInput,
        )
    });

    // Batch jobs mix thumbnails with multi-megapixel portraits; the large
    // waiters must not starve behind the small ones.
    let policy = SizePolicy::default();
    let small = estimate_working_set(320, 240, &policy);
    let large = estimate_working_set(6000, 4000, &policy);
    c.bench_function("mixed_job_weights", |b| {
        b.iter_batched(
            || (),
            |_| {
                hammer(iterations / 4, threads, large * 2, |t| {
                    if t % 8 == 0 {
                        large
                    } else {
                        small
                    }
                })
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(memory_semaphore, bench_contention);
criterion_main!(memory_semaphore);
