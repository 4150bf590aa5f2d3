use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::Rng;
use shardscan_core::{ComputeContext, ComputeStream, CpuBackend, DistanceBackend, ScratchMemory};

const DIM: usize = 64;
const ROWS: usize = 4096;
const QUERIES: usize = 32;
const K: usize = 10;

fn gen_matrix(rows: usize) -> Array2<f32> {
    let mut rng = rand::thread_rng();
    Array2::from_shape_fn((rows, DIM), |_| rng.gen_range(-1.0..1.0))
}

fn criterion_benchmark(c: &mut Criterion) {
    let reference = gen_matrix(ROWS);
    let queries = gen_matrix(QUERIES);
    let backend = CpuBackend::new();
    let mut group = c.benchmark_group("cpu_brute_force_knn");

    for (name, scratch) in [
        ("scratch_none", ScratchMemory::None),
        ("scratch_default", ScratchMemory::Default),
    ] {
        group.bench_function(name, |b| {
            let mut distances = Array2::<f32>::zeros((QUERIES, K));
            let mut labels = Array2::<i64>::zeros((QUERIES, K));
            b.iter(|| {
                let mut stream = backend.open_stream(ComputeContext::Host, scratch).unwrap();
                stream
                    .brute_force_knn(
                        black_box(reference.view()),
                        black_box(queries.view()),
                        K,
                        distances.view_mut(),
                        labels.view_mut(),
                    )
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
