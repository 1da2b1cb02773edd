use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_pipeline::prelude::*;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    // Three shifted gaussian-ish blobs
    let y = Array1::from_shape_fn(n_rows, |i| (i % 3) as f64);
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, _)| {
        y[i] * 2.0 + rng.gen::<f64>() * 3.0
    });
    (x, y)
}

fn pipeline() -> Pipeline {
    Pipeline::new(vec![
        Step::transformer("scaler", Scaler::standard()),
        Step::transformer("pca", Pca::new(2)),
        Step::estimator("tree", DecisionTreeClassifier::new().with_max_depth(8)),
    ])
    .unwrap()
}

fn bench_pipeline_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_fit");
    group.sample_size(10);

    for n_rows in [1000, 5000, 10000].iter() {
        let (x, y) = create_classification_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut pipe = pipeline();
                pipe.fit(black_box(x), black_box(y)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_pipeline_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_predict");

    let (x_train, y_train) = create_classification_data(5000, 10);
    let mut pipe = pipeline();
    pipe.fit(&x_train, &y_train).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let (x, _) = create_classification_data(*n_rows, 10);
        group.bench_with_input(BenchmarkId::new("predict", n_rows), &x, |b, x| {
            b.iter(|| pipe.predict(black_box(x)).unwrap())
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let (x, y) = load_iris().into_xy().unwrap();
    let grid = ParameterGrid::new()
        .add("pca__n_components", vec![1, 2, 3])
        .add("tree__max_depth", vec![2, 3, 4]);

    for n_jobs in [1usize, 0].iter() {
        group.bench_with_input(BenchmarkId::new("n_jobs", n_jobs), n_jobs, |b, &n_jobs| {
            b.iter(|| {
                let mut search = GridSearchCV::new(pipeline(), grid.clone()).with_n_jobs(n_jobs);
                search.fit(black_box(&x), black_box(&y)).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline_fit, bench_pipeline_predict, bench_grid_search);
criterion_main!(benches);
