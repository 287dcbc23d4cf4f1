//! Benchmarks for forest training and prediction.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trainflow::ml::{ForestParams, Preprocessor, RandomForestClassifier, SplitCriterion};
use trainflow::testing::fixtures::{insurance_schema, insurance_table};

fn forest_benchmark(c: &mut Criterion) {
    let schema = insurance_schema();
    let table = insurance_table(1_000, 7);
    let preprocessor = Preprocessor::fit(&schema, &table).expect("fixture encodes");
    let (features, labels) = preprocessor.transform(&table).expect("fixture encodes");

    let mut group = c.benchmark_group("forest_fit");
    group.sample_size(10);
    for n_estimators in [10, 50] {
        let params = ForestParams {
            n_estimators,
            max_depth: 10,
            min_samples_split: 7,
            min_samples_leaf: 6,
            criterion: SplitCriterion::Entropy,
            random_state: 101,
        };
        group.bench_with_input(BenchmarkId::from_parameter(n_estimators), &params, |b, params| {
            b.iter(|| {
                RandomForestClassifier::fit(
                    black_box(features.view()),
                    black_box(labels.view()),
                    params.clone(),
                )
            });
        });
    }
    group.finish();

    let forest = RandomForestClassifier::fit(features.view(), labels.view(), ForestParams::default())
        .expect("fixture trains");
    c.bench_function("forest_predict_1000", |b| {
        b.iter(|| forest.predict(black_box(features.view())));
    });
}

criterion_group!(benches, forest_benchmark);
criterion_main!(benches);
