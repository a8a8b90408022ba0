//! Criterion benchmarks for the key map.
//!
//! Key translation sits on the input hot path: once per key/key-up event on
//! the server, the wire code is resolved to a named key (char-flagged
//! packets bypass the table entirely).  The lookups are match-based tables
//! and should stay in the nanosecond range.
//!
//! Run with:
//! ```bash
//! cargo bench --package rawterm-core --bench keymap_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rawterm_core::keymap::KeyCode;

fn bench_keymap(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap");

    group.bench_function("from_code_hit", |b| {
        b.iter(|| KeyCode::from_code(black_box(30)));
    });
    group.bench_function("from_code_miss", |b| {
        b.iter(|| KeyCode::from_code(black_box(250)));
    });
    group.bench_function("code_lookup", |b| {
        b.iter(|| black_box(KeyCode::A).code());
    });
    group.bench_function("name_lookup", |b| {
        b.iter(|| black_box(KeyCode::Enter).name());
    });

    group.finish();
}

criterion_group!(benches, bench_keymap);
criterion_main!(benches);
