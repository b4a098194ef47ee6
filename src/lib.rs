//! # kdforest
//!
//! An in-memory randomized kd-forest index for approximate nearest-neighbor
//! (ANN) search over dense vectors, with exact search as the unlimited-budget
//! special case.
//!
//! A forest is an ensemble of independently randomized partition trees built
//! once over a fixed point set. Queries run a best-bin-first priority search
//! across all trees under a comparison budget: tight budgets give fast
//! approximate answers, a budget of 0 gives the exact top-k.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kdforest::{DistanceMetric, KdForest, ThresholdingMethod};
//! use ndarray::Array2;
//!
//! let forest = KdForest::<f64>::builder()
//!     .dim(2)
//!     .num_trees(4)
//!     .distance_metric(DistanceMetric::L2)
//!     .thresholding(ThresholdingMethod::Median)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! // Rows are points; the array is shared with the forest, never copied.
//! let points = Arc::new(
//!     Array2::from_shape_vec((4, 2), vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 5.0, 5.0]).unwrap(),
//! );
//! forest.build(points).unwrap();
//!
//! let mut searcher = forest.searcher().unwrap();
//! for n in searcher.query(&[0.1, 0.0], 2).unwrap() {
//!     println!("index={} distance={:.4}", n.index, n.distance);
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Effect                                                |
//! |------------|-------------------------------------------------------|
//! | `parallel` | Parallel tree construction and batch queries via rayon |
//! | `full`     | Enables `parallel`                                    |

pub mod distance;
pub mod element;
pub mod error;
pub mod forest;
pub mod metrics;
pub mod search;
pub mod tree;
pub mod tuning;

// Re-exports for convenience.
pub use distance::{DistanceMetric, ScoreConvention};
pub use element::Element;
pub use error::{KdForestError, Result};
pub use forest::{ForestConfig, ForestStats, KdForest, KdForestBuilder};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use search::{Neighbor, Searcher};
pub use tree::{PartitionTree, ThresholdingMethod};
pub use tuning::{estimate_recall, suggest_params, SuggestedParams};
