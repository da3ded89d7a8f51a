use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spatial_hash::util::generate_keys;
use spatial_hash::{BuildParams, Key192, SpatialHash};

fn seeded() -> BuildParams {
    BuildParams {
        seed: Some(13),
        ..BuildParams::default()
    }
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for size in [1_000usize, 10_000, 100_000] {
        let keys = generate_keys::<Key192>(size, 13);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(SpatialHash::build(black_box(&keys), seeded()).unwrap()))
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let keys = generate_keys::<Key192>(100_000, 13);
    let table = SpatialHash::build(&keys, seeded()).unwrap();

    c.bench_function("index_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = &keys[i % keys.len()];
            i = i.wrapping_add(1);
            black_box(table.index(black_box(key)))
        })
    });

    let absent = Key192::new(1, 2, 3);
    c.bench_function("index_miss", |b| {
        b.iter(|| black_box(table.index(black_box(&absent))))
    });
}

criterion_group!(benches, bench_build, bench_lookup);
criterion_main!(benches);
