use std::io::Write;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scopeline::{Engine, ScopeConfig};

fn make_file(lines: usize) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    for i in 0..lines {
        if i % 37 == 0 {
            writeln!(f, "err: something went wrong at line {i}").unwrap();
        } else {
            writeln!(f, "line {i}: nothing to see here").unwrap();
        }
    }
    f.flush().unwrap();
    f
}

fn bench_fetch(c: &mut Criterion) {
    let file = make_file(200_000);
    c.bench_function("fetch_all/200k_lines", |b| {
        b.iter(|| {
            let mut engine = Engine::open(file.path(), ScopeConfig::new()).unwrap();
            engine.fetch_all().unwrap();
            black_box(engine.block_count());
        })
    });
}

fn bench_filter_no_scope(c: &mut Criterion) {
    let file = make_file(200_000);
    c.bench_function("filter_all/no_scope/200k_lines", |b| {
        b.iter(|| {
            let mut engine = Engine::open(file.path(), ScopeConfig::new()).unwrap();
            engine.fetch_all().unwrap();
            engine.set_pattern("^err").unwrap();
            engine.filter_all().unwrap();
            engine.merge_scope().unwrap();
        })
    });
}

fn bench_filter_with_scope(c: &mut Criterion) {
    let file = make_file(200_000);
    c.bench_function("filter_all/scope_3_3/200k_lines", |b| {
        b.iter(|| {
            let mut engine = Engine::open(file.path(), ScopeConfig::new().scope(3, 3)).unwrap();
            engine.fetch_all().unwrap();
            engine.set_pattern("^err").unwrap();
            engine.filter_all().unwrap();
            engine.merge_scope().unwrap();
        })
    });
}

fn bench_sequential_get_line(c: &mut Criterion) {
    let file = make_file(50_000);
    let mut engine = Engine::open(file.path(), ScopeConfig::new()).unwrap();
    engine.fetch_all().unwrap();
    c.bench_function("get_line/sequential/50k_lines", |b| {
        b.iter(|| {
            for i in 0..1000u32 {
                black_box(engine.get_line(i).unwrap());
            }
        })
    });
}

fn bench_par_fetch(c: &mut Criterion) {
    let file = make_file(2_000_000);
    c.bench_function("par_fetch_all/2M_lines", |b| {
        b.iter(|| {
            let mut engine = Engine::open(file.path(), ScopeConfig::new()).unwrap();
            engine.par_fetch_all().unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_fetch,
    bench_filter_no_scope,
    bench_filter_with_scope,
    bench_sequential_get_line,
    bench_par_fetch,
);
criterion_main!(benches);
