use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kdforest::{DistanceMetric, KdForest, ThresholdingMethod};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_points(n: usize, dim: usize, seed: u64) -> Arc<Array2<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    Arc::new(Array2::from_shape_fn((n, dim), |_| {
        StandardNormal.sample(&mut rng)
    }))
}

fn generate_queries(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dim).map(|_| StandardNormal.sample(&mut rng)).collect())
        .collect()
}

fn brute_force_query(points: &Array2<f32>, query: &[f32], k: usize) -> Vec<(usize, f32)> {
    let q = ArrayView1::from(query);
    let mut dists: Vec<(usize, f32)> = (0..points.nrows())
        .map(|i| {
            (
                i,
                DistanceMetric::L2.compute(&q, &points.row(i)),
            )
        })
        .collect();
    dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    dists.truncate(k);
    dists
}

fn build_forest(points: Arc<Array2<f32>>, dim: usize, max_comparisons: usize) -> KdForest<f32> {
    let forest = KdForest::<f32>::builder()
        .dim(dim)
        .num_trees(4)
        .distance_metric(DistanceMetric::L2)
        .thresholding(ThresholdingMethod::Median)
        .max_comparisons(max_comparisons)
        .seed(42)
        .build()
        .unwrap();
    forest.build(points).unwrap();
    forest
}

// ---------------------------------------------------------------------------
// Forest construction
// ---------------------------------------------------------------------------

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for &dim in &[32, 128] {
        for &n in &[1_000usize, 10_000] {
            let points = generate_points(n, dim, 99);

            group.bench_with_input(
                BenchmarkId::new(format!("dim={dim}"), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        build_forest(points.clone(), dim, 0);
                    });
                },
            );
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Single query latency: budgeted forest vs. brute force
// ---------------------------------------------------------------------------

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let k = 10;

    for &dim in &[32, 128] {
        for &n in &[1_000usize, 10_000, 100_000] {
            let points = generate_points(n, dim, 99);
            let query = generate_queries(1, dim, 1234).remove(0);

            let forest = build_forest(points.clone(), dim, 1_000);
            let mut searcher = forest.searcher().unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("forest/dim={dim}"), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        searcher.query(&query, k).unwrap();
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("brute/dim={dim}"), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        brute_force_query(&points, &query, k);
                    });
                },
            );
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Budget sweep: latency as the comparison budget grows
// ---------------------------------------------------------------------------

fn bench_budget_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("budget_sweep");
    let dim = 64;
    let n = 50_000;
    let k = 10;

    let points = generate_points(n, dim, 99);
    let forest = build_forest(points, dim, 0);
    let query = generate_queries(1, dim, 77).remove(0);

    // 0 is the unlimited (exact) sentinel.
    for &budget in &[100usize, 1_000, 10_000, 0] {
        forest.set_max_comparisons(budget);
        let mut searcher = forest.searcher().unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(budget),
            &budget,
            |b, _| {
                b.iter(|| {
                    searcher.query(&query, k).unwrap();
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Batch query (100 queries)
// ---------------------------------------------------------------------------

fn bench_batch_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_query_100");
    let k = 10;
    let num_queries = 100;

    for &dim in &[32, 128] {
        for &n in &[1_000usize, 10_000] {
            let points = generate_points(n, dim, 99);
            let queries = generate_queries(num_queries, dim, 5678);

            let forest = build_forest(points.clone(), dim, 1_000);
            let mut searcher = forest.searcher().unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("forest/dim={dim}"), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        for q in &queries {
                            searcher.query(q, k).unwrap();
                        }
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("brute/dim={dim}"), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        for q in &queries {
                            brute_force_query(&points, q, k);
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_build,
    bench_query,
    bench_budget_sweep,
    bench_batch_query
);
criterion_main!(benches);
