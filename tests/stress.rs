use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use kdforest::*;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn gaussian_points(rng: &mut StdRng, n: usize, dim: usize) -> Array2<f32> {
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    Array2::from_shape_fn((n, dim), |_| normal.sample(rng))
}

fn random_query(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    (0..dim).map(|_| normal.sample(rng)).collect()
}

fn make_forest(dim: usize, num_trees: usize, seed: u64) -> KdForest<f32> {
    KdForest::<f32>::builder()
        .dim(dim)
        .num_trees(num_trees)
        .distance_metric(DistanceMetric::L2)
        .seed(seed)
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// 1. Many concurrent searchers over one forest
//    8 threads, each with its own reusable searcher, hammering the same
//    built forest. Verify no panics and well-formed results throughout.
// ---------------------------------------------------------------------------

#[test]
fn stress_concurrent_searchers() {
    let dim = 32;
    let n = 20_000;
    let queries_per_thread = 200;

    let mut rng = StdRng::seed_from_u64(42);
    let forest = Arc::new(make_forest(dim, 4, 42));
    forest
        .build(Arc::new(gaussian_points(&mut rng, n, dim)))
        .unwrap();
    forest.set_max_comparisons(500);

    let mut handles = Vec::new();
    for t in 0..8u64 {
        let forest = Arc::clone(&forest);
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(100 + t);
            let mut searcher = forest.searcher().unwrap();
            for _ in 0..queries_per_thread {
                let q = random_query(&mut rng, dim);
                let results = searcher.query(&q, 10).unwrap();
                assert!(results.len() <= 10);
                for pair in results.windows(2) {
                    assert!(pair[0].distance <= pair[1].distance);
                }
                for r in &results {
                    assert!(r.distance.is_finite(), "non-finite distance: {}", r.distance);
                    assert!(r.index < n, "index {} out of range", r.index);
                }
            }
        }));
    }
    for h in handles {
        h.join().expect("searcher thread panicked");
    }
}

// ---------------------------------------------------------------------------
// 2. Large-scale build
//    100,000 x 64 points, verify stats and invariants, then query.
// ---------------------------------------------------------------------------

#[test]
fn stress_large_scale_build() {
    let dim = 64;
    let n = 100_000;

    let mut rng = StdRng::seed_from_u64(7);
    let forest = make_forest(dim, 4, 7);
    forest
        .build(Arc::new(gaussian_points(&mut rng, n, dim)))
        .unwrap();

    assert_eq!(forest.len(), n);
    for t in 0..forest.num_trees() {
        let nodes = forest.tree_node_count(t).unwrap();
        assert!(nodes <= 2 * n - 1, "tree {t}: {nodes} nodes exceeds 2n-1");
    }

    let stats = forest.stats();
    assert_eq!(stats.num_points, n);
    assert!(stats.max_depth > 0);
    assert!(stats.memory_estimate_bytes > n * dim * 4);

    forest.set_max_comparisons(2_000);
    let results = forest.query(&random_query(&mut rng, dim), 20).unwrap();
    assert!(!results.is_empty(), "querying a 100k forest should return results");
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

// ---------------------------------------------------------------------------
// 3. Budget reconfiguration under concurrent queries
//    Readers query continuously while one thread keeps flipping the
//    comparison budget. Queries must stay panic-free and well-formed.
// ---------------------------------------------------------------------------

#[test]
fn stress_budget_reconfiguration_under_queries() {
    let dim = 16;
    let n = 5_000;

    let mut rng = StdRng::seed_from_u64(10);
    let forest = Arc::new(make_forest(dim, 4, 10));
    forest
        .build(Arc::new(gaussian_points(&mut rng, n, dim)))
        .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::new();

    for t in 0..4u64 {
        let forest = Arc::clone(&forest);
        let done_flag = Arc::clone(&done);
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(200 + t);
            let mut searcher = forest.searcher().unwrap();
            let mut count = 0u64;
            while !done_flag.load(Ordering::Relaxed) {
                let q = random_query(&mut rng, dim);
                let results = searcher.query(&q, 5).unwrap();
                for r in &results {
                    assert!(r.distance.is_finite());
                }
                count += 1;
                if count > 50_000 {
                    break;
                }
            }
        }));
    }

    {
        let forest = Arc::clone(&forest);
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(999);
            for _ in 0..200 {
                forest.set_max_comparisons(rng.gen_range(0..2_000));
            }
            forest.set_max_comparisons(0);
        }));
    }

    let reconfig = handles.pop().unwrap();
    reconfig.join().expect("reconfiguration thread panicked");
    done.store(true, Ordering::Relaxed);
    for h in handles {
        h.join().expect("reader thread panicked");
    }

    assert_eq!(forest.max_comparisons(), 0);
}

// ---------------------------------------------------------------------------
// 4. Searchers dropped mid-stream
//    Create and discard many searchers, some after a single query, while
//    others keep running. Dropping must leak nothing and disturb nobody.
// ---------------------------------------------------------------------------

#[test]
fn stress_searcher_churn() {
    let dim = 16;
    let n = 2_000;

    let mut rng = StdRng::seed_from_u64(20);
    let forest = Arc::new(make_forest(dim, 3, 20));
    forest
        .build(Arc::new(gaussian_points(&mut rng, n, dim)))
        .unwrap();
    forest.set_max_comparisons(300);

    let mut handles = Vec::new();
    for t in 0..8u64 {
        let forest = Arc::clone(&forest);
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(300 + t);
            for _ in 0..500 {
                let mut searcher = forest.searcher().unwrap();
                let q = random_query(&mut rng, dim);
                let _ = searcher.query(&q, 3).unwrap();
                // Searcher dropped here, independently of the forest.
            }
        }));
    }
    for h in handles {
        h.join().expect("churn thread panicked");
    }
}

// ---------------------------------------------------------------------------
// 5. Exactness holds at scale
//    5,000 points: unlimited-budget forest queries must equal the linear
//    scan, including result order.
// ---------------------------------------------------------------------------

#[test]
fn stress_exactness_at_scale() {
    let dim = 16;
    let n = 5_000;
    let k = 25;

    let mut rng = StdRng::seed_from_u64(30);
    let points = Arc::new(gaussian_points(&mut rng, n, dim));
    let forest = make_forest(dim, 4, 30);
    forest.build(points.clone()).unwrap();

    let mut searcher = forest.searcher().unwrap();
    for _ in 0..20 {
        let q = random_query(&mut rng, dim);

        let qv = ndarray::ArrayView1::from(q.as_slice());
        let mut expected: Vec<(usize, f32)> = (0..n)
            .map(|i| (i, distance::l2_distance(&qv, &points.row(i))))
            .collect();
        expected.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let got = searcher.query(&q, k).unwrap();
        assert_eq!(got.len(), k);
        for (g, (ei, ed)) in got.iter().zip(expected.iter()) {
            assert_eq!(g.index, *ei);
            assert!((g.distance - ed).abs() < 1e-4);
        }
    }
}
