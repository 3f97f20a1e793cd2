use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use strided_expr::{assign_with, binary, s, Array, AssignStrategy, Layout};

fn random_array(size: usize, layout: Layout, seed: u64) -> Array<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array::from_fn(&[size, size], layout, |_| rng.gen_range(-1.0..1.0))
}

fn bench_copy_transposed(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_transposed");
    for size in [100usize, 500, 1000] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_array(size, Layout::RowMajor, 1);
        let a_t = a.transpose();
        let mut out = Array::<f64>::zeros(&[size, size], Layout::RowMajor);

        for strategy in [AssignStrategy::Strided, AssignStrategy::Cursor] {
            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        if let Err(err) = assign_with(&mut out.view_mut(), &a_t, strategy) {
                            panic!("assign failed: {err}");
                        }
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_binary_contiguous(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_contiguous");
    for size in [100usize, 500, 1000] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_array(size, Layout::RowMajor, 2);
        let b = random_array(size, Layout::RowMajor, 3);
        let sum = match binary(|x: f64, y: f64| x + y, &a, &b) {
            Ok(expr) => expr,
            Err(err) => panic!("binary failed: {err}"),
        };
        let mut out = Array::<f64>::zeros(&[size, size], Layout::RowMajor);

        for strategy in [AssignStrategy::Linear, AssignStrategy::Cursor] {
            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), size),
                &size,
                |bench, _| {
                    bench.iter(|| {
                        if let Err(err) = assign_with(&mut out.view_mut(), &sum, strategy) {
                            panic!("assign failed: {err}");
                        }
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_broadcast_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_row");
    for size in [100usize, 1000] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_array(size, Layout::ColumnMajor, 4);
        let row = match a.slice(&s![0..1, ..]) {
            Ok(v) => v,
            Err(err) => panic!("slice failed: {err}"),
        };
        let mut out = Array::<f64>::zeros(&[size, size], Layout::RowMajor);

        group.bench_with_input(BenchmarkId::new("strided", size), &size, |b, _| {
            b.iter(|| {
                if let Err(err) = out.assign(&row) {
                    panic!("assign failed: {err}");
                }
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_copy_transposed,
    bench_binary_contiguous,
    bench_broadcast_row
);
criterion_main!(benches);
