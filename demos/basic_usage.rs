//! Basic usage of `kdforest`.
//!
//! Demonstrates the builder pattern, binding a random point set, querying
//! through a searcher, inspecting stats and metrics, and auto-tuning.
//!
//! Run with:
//!   cargo run --example basic_usage

use std::sync::Arc;

use kdforest::*;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 128;
const NUM_POINTS: usize = 10_000;

fn main() {
    // ---------------------------------------------------------------
    // 1. Configure a forest using the builder pattern.
    // ---------------------------------------------------------------
    println!("=== Step 1: Configure the forest ===");
    let forest = KdForest::<f64>::builder()
        .dim(DIM)
        .num_trees(4)
        .distance_metric(DistanceMetric::L2)
        .thresholding(ThresholdingMethod::Median)
        .seed(42)
        .enable_metrics()
        .build()
        .expect("failed to configure forest");

    println!(
        "Configured forest: dim={}, trees=4, metric=L2, thresholding=Median, seed=42, metrics=on\n",
        DIM
    );

    // ---------------------------------------------------------------
    // 2. Generate 10,000 random 128-d points and build the trees.
    // ---------------------------------------------------------------
    println!("=== Step 2: Build over {} random points ===", NUM_POINTS);

    let mut rng = StdRng::seed_from_u64(123);
    let points = Arc::new(Array2::from_shape_fn((NUM_POINTS, DIM), |_| {
        rng.gen::<f64>()
    }));

    forest.build(points.clone()).expect("build failed");

    println!("Built {} trees over {} points.", forest.num_trees(), forest.len());
    for t in 0..forest.num_trees() {
        println!(
            "  tree {}: data {} [{} x {}]",
            t + 1,
            forest.element_type(),
            forest.dim(),
            forest.tree_node_count(t).expect("tree node count"),
        );
    }
    println!();

    // ---------------------------------------------------------------
    // 3. Query top-5 nearest neighbors for point #0.
    // ---------------------------------------------------------------
    println!("=== Step 3: Query top-5 nearest neighbors of point #0 ===");

    forest.set_max_comparisons(0); // unlimited: exact search
    let query: Vec<f64> = points.row(0).to_vec();

    let mut searcher = forest.searcher().expect("searcher failed");
    let results = searcher.query(&query, 5).expect("query failed");

    for (rank, n) in results.iter().enumerate() {
        println!(
            "  rank={} index={:<6} distance={:.6}",
            rank + 1,
            n.index,
            n.distance
        );
    }
    println!();

    // ---------------------------------------------------------------
    // 4. Query again under a tight comparison budget.
    // ---------------------------------------------------------------
    println!("=== Step 4: Same query with a 500-comparison budget ===");

    forest.set_max_comparisons(500);
    let approx = searcher.query(&query, 5).expect("budgeted query failed");
    for (rank, n) in approx.iter().enumerate() {
        println!(
            "  rank={} index={:<6} distance={:.6}",
            rank + 1,
            n.index,
            n.distance
        );
    }
    println!();

    // ---------------------------------------------------------------
    // 5. Show forest stats.
    // ---------------------------------------------------------------
    println!("=== Step 5: Forest statistics ===");
    let stats = forest.stats();
    println!("  {}", stats);
    println!("  Points:          {}", stats.num_points);
    println!("  Trees:           {}", stats.num_trees);
    println!("  Dimension:       {}", stats.dimension);
    println!("  Total nodes:     {}", stats.total_nodes);
    println!("  Total leaves:    {}", stats.total_leaves);
    println!("  Avg leaf size:   {:.2}", stats.avg_leaf_size);
    println!("  Max depth:       {}", stats.max_depth);
    println!(
        "  Memory estimate: {:.2} MB",
        stats.memory_estimate_bytes as f64 / (1024.0 * 1024.0)
    );
    println!();

    // ---------------------------------------------------------------
    // 6. Show metrics snapshot.
    // ---------------------------------------------------------------
    println!("=== Step 6: Metrics snapshot ===");
    if let Some(m) = forest.metrics() {
        println!("  {}", m);
        println!("  Query count:               {}", m.query_count);
        println!("  Avg query time:            {:.2} us", m.avg_query_time_us);
        println!("  Avg comparisons per query: {:.1}", m.avg_comparisons_per_query);
        println!("  Budget exhaustion rate:    {:.1}%", m.budget_exhaustion_rate * 100.0);
    } else {
        println!("  Metrics not enabled.");
    }
    println!();

    // ---------------------------------------------------------------
    // 7. Auto-tuning: suggest parameters for a target recall.
    // ---------------------------------------------------------------
    println!("=== Step 7: Auto-tuning suggestions ===");

    let suggested = suggest_params(0.9, NUM_POINTS, DIM);
    println!("  Target recall: 0.90");
    println!("  Suggested num_trees:       {}", suggested.num_trees);
    println!("  Suggested max_comparisons: {}", suggested.max_comparisons);
    println!("  Estimated recall:          {:.4}", suggested.estimated_recall);

    let current = estimate_recall(4, 500, NUM_POINTS, DIM);
    println!("  Current config estimated recall: {current:.4}");
    println!();

    println!("Done.");
}
