use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn criterion_benchmark(c: &mut Criterion) {
    let source = include_str!("../tests/corpus/average.jack");

    c.bench_function("compile average", |b| {
        b.iter(|| jack::compile_to_string(black_box(source)).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
