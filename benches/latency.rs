//! Criterion latency benchmarks for the matching hot path.
//!
//! Measures: resting an order, full matches at varying depth, cancels
//! at varying book size, iceberg refill churn, FOK feasibility walks,
//! and a mixed place/cancel workload.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use flux_lob::{Book, Side, Tif};

const TICKS: usize = 1 << 16;

fn bench_book() -> Book {
    let mut book = Book::with_tick_range(TICKS, 1 << 20);
    book.set_benchmark_mode(true);
    book.warm_up();
    book
}

/// Resting order, no match: the pure insert path.
fn bench_rest_no_match(c: &mut Criterion) {
    let mut book = bench_book();
    let mut order_id = 0u64;

    c.bench_function("rest_no_match", |b| {
        b.iter(|| {
            order_id += 1;
            book.add_limit(order_id, Side::Buy, 9_000, 100, 1);
            black_box(book.best_bid())
        })
    });
}

/// Full match against pre-loaded depth at one level.
fn bench_full_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_match");

    for depth in [1u64, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut book = bench_book();
            for i in 0..depth {
                book.add_limit(i, Side::Sell, 10_000, 100, 1);
            }

            let mut order_id = 1_000_000u64;
            b.iter(|| {
                order_id += 1;
                // Lift one resting order, then replace it
                book.execute(order_id, Side::Buy, 10_000, 100, Tif::Ioc, 2);
                order_id += 1;
                book.add_limit(order_id, Side::Sell, 10_000, 100, 1);
                black_box(book.best_ask())
            })
        });
    }

    group.finish();
}

/// Cancel from books of increasing size.
fn bench_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancel");

    for book_size in [100u64, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(book_size),
            &book_size,
            |b, &book_size| {
                let mut book = bench_book();
                for i in 0..book_size {
                    let (side, price) = if i % 2 == 0 {
                        (Side::Buy, 9_000 + (i % 100) as i64)
                    } else {
                        (Side::Sell, 11_000 + (i % 100) as i64)
                    };
                    book.add_limit(i, side, price, 100, 1);
                }

                let mut cancel_id = 0u64;
                let mut next_id = book_size;
                b.iter(|| {
                    book.cancel(cancel_id);
                    let (side, price) = if cancel_id % 2 == 0 {
                        (Side::Buy, 9_000 + (cancel_id % 100) as i64)
                    } else {
                        (Side::Sell, 11_000 + (cancel_id % 100) as i64)
                    };
                    book.add_limit(next_id, side, price, 100, 1);
                    cancel_id = next_id;
                    next_id += 1;
                    black_box(book.active_orders())
                })
            },
        );
    }

    group.finish();
}

/// Sweeping an iceberg through repeated refills.
fn bench_iceberg_refill(c: &mut Criterion) {
    let mut book = bench_book();
    let mut id = 0u64;

    c.bench_function("iceberg_refill_sweep", |b| {
        b.iter(|| {
            id += 1;
            book.add_iceberg(id, Side::Sell, 10_000, 1_000, 100, 1);
            id += 1;
            // Ten refill cycles per sweep
            book.execute(id, Side::Buy, 10_000, 1_000, Tif::Ioc, 2);
            black_box(book.active_orders())
        })
    });
}

/// FOK feasibility walk over a ladder of levels, then the sweep.
fn bench_fok(c: &mut Criterion) {
    let mut group = c.benchmark_group("fok");

    for levels in [1i64, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(levels), &levels, |b, &levels| {
            let mut book = bench_book();
            for i in 0..levels {
                book.add_limit(i as u64, Side::Sell, 10_000 + i, 100, 1);
            }
            let total = levels * 100;

            let mut id = 1_000_000u64;
            b.iter(|| {
                id += 1;
                // Insufficient by one: pure feasibility cost, no mutation
                black_box(book.execute(id, Side::Buy, 10_000 + levels, total + 1, Tif::Fok, 2))
            })
        });
    }

    group.finish();
}

/// Mixed 70/30 place/cancel workload around a tight spread.
fn bench_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_workload");
    group.throughput(Throughput::Elements(1));

    group.bench_function("70_place_30_cancel", |b| {
        let mut book = bench_book();
        let mut rng = ChaCha8Rng::seed_from_u64(0xDEAD_BEEF);
        let mut order_id = 0u64;

        for _ in 0..1_000 {
            order_id += 1;
            book.add_limit(
                order_id,
                if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
                rng.gen_range(9_900..10_100),
                rng.gen_range(1..1_000),
                1,
            );
        }

        b.iter(|| {
            if rng.gen_bool(0.7) {
                order_id += 1;
                book.add_limit(
                    order_id,
                    if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
                    rng.gen_range(9_900..10_100),
                    rng.gen_range(1..1_000),
                    1,
                );
            } else {
                book.cancel(rng.gen_range(1..=order_id));
            }
            black_box(book.active_orders())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_rest_no_match,
    bench_full_match,
    bench_cancel,
    bench_iceberg_refill,
    bench_fok,
    bench_mixed_workload,
);

criterion_main!(benches);
