//! Percentile latency report over a replayed synthetic feed.
//!
//! Drives the no-lock path with a pre-generated command tape and
//! buckets per-command wall time into an HDR histogram. Run with
//! `cargo run --release --features bench-tools --bin latency_report`.

use std::time::Instant;

use hdrhistogram::Histogram;

use flux_lob::{Book, Side, Tif};

const WARMUP_OPS: usize = 100_000;
const MEASURED_OPS: usize = 1_000_000;
const TICKS: usize = 1 << 16;

#[derive(Clone, Copy)]
enum Op {
    Add { id: u64, side: Side, price: i64, qty: i64 },
    Cancel { id: u64 },
    Execute { id: u64, side: Side, price: i64, qty: i64 },
}

/// Deterministic tape: a 60/30/10 add/cancel/execute mix around a tight
/// spread, built from a splitmix-style counter so runs are repeatable
/// without an RNG dependency in the shipped binary.
fn generate_tape(count: usize) -> Vec<Op> {
    #[inline]
    fn mix(mut x: u64) -> u64 {
        x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
        x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        x ^ (x >> 31)
    }

    let mut tape = Vec::with_capacity(count);
    let mut live: Vec<u64> = Vec::new();
    let mut next_id = 1u64;

    for i in 0..count as u64 {
        let r = mix(i);
        let roll = r % 100;
        let side = if r & 0x100 == 0 { Side::Buy } else { Side::Sell };
        let price = 9_800 + (r >> 9) as i64 % 400;
        let qty = 1 + (r >> 20) as i64 % 200;

        if roll < 60 || live.is_empty() {
            let id = next_id;
            next_id += 1;
            live.push(id);
            tape.push(Op::Add { id, side, price, qty });
        } else if roll < 90 {
            let idx = (r >> 33) as usize % live.len();
            let id = live.swap_remove(idx);
            tape.push(Op::Cancel { id });
        } else {
            let id = next_id;
            next_id += 1;
            tape.push(Op::Execute { id, side, price, qty });
        }
    }

    tape
}

fn apply(book: &mut Book, op: Op) {
    match op {
        Op::Add { id, side, price, qty } => book.add_limit(id, side, price, qty, 1),
        Op::Cancel { id } => book.cancel(id),
        Op::Execute { id, side, price, qty } => {
            book.execute(id, side, price, qty, Tif::Ioc, 1);
        }
    }
}

fn main() {
    println!("generating {} commands...", WARMUP_OPS + MEASURED_OPS);
    let tape = generate_tape(WARMUP_OPS + MEASURED_OPS);

    let mut book = Book::with_tick_range(TICKS, 1 << 20);
    book.set_benchmark_mode(true);
    book.warm_up();
    let ring = book.events();

    println!("warming up ({WARMUP_OPS} ops)...");
    for &op in &tape[..WARMUP_OPS] {
        apply(&mut book, op);
    }
    book.flush_events();
    while ring.pop().is_some() {}

    println!("measuring {MEASURED_OPS} ops...");
    let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3)
        .expect("histogram bounds");
    let run_start = Instant::now();

    for &op in &tape[WARMUP_OPS..] {
        let start = Instant::now();
        apply(&mut book, op);
        let nanos = start.elapsed().as_nanos() as u64;
        histogram.record(nanos.max(1)).expect("histogram record");

        // Keep the ring from saturating mid-run
        if ring.len() > (1 << 19) {
            while ring.pop().is_some() {}
        }
    }
    let elapsed = run_start.elapsed();
    book.flush_events();

    let throughput = MEASURED_OPS as f64 / elapsed.as_secs_f64();
    println!();
    println!("=== latency report ===");
    println!("ops:          {MEASURED_OPS}");
    println!("elapsed:      {:.3} s", elapsed.as_secs_f64());
    println!("throughput:   {:.0} ops/s", throughput);
    println!("trades:       {}", book.trades_executed());
    println!("active:       {}", book.active_orders());
    println!();
    println!("latency (ns):");
    println!("  mean        {:>10.0}", histogram.mean());
    for q in [50.0, 90.0, 99.0, 99.9, 99.99] {
        println!("  p{q:<10} {:>10}", histogram.value_at_percentile(q));
    }
    println!("  max         {:>10}", histogram.max());
}
