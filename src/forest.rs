use std::marker::PhantomData;
use std::sync::Arc;

use ndarray::Array2;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::DistanceMetric;
use crate::element::Element;
use crate::error::{KdForestError, Result};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::search::{Neighbor, Searcher};
use crate::tree::{PartitionTree, ThresholdingMethod};

/// Configuration for a kd-forest.
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Dimensionality of indexed vectors.
    pub dim: usize,
    /// Number of independently randomized trees.
    pub num_trees: usize,
    /// Metric used to rank neighbors.
    pub distance_metric: DistanceMetric,
    /// Split-threshold policy, fixed before build.
    pub thresholding: ThresholdingMethod,
    /// Per-query comparison budget; 0 means unlimited (exact search).
    pub max_comparisons: usize,
    /// Optional RNG seed for reproducible tree structure.
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            dim: 128,
            num_trees: 4,
            distance_metric: DistanceMetric::L2,
            thresholding: ThresholdingMethod::Median,
            max_comparisons: 0,
            seed: None,
        }
    }
}

/// Aggregate statistics about a built forest.
#[derive(Debug, Clone)]
pub struct ForestStats {
    pub num_points: usize,
    pub dimension: usize,
    pub num_trees: usize,
    pub total_nodes: usize,
    pub total_leaves: usize,
    pub avg_leaf_size: f64,
    pub max_leaf_size: usize,
    pub max_depth: usize,
    pub memory_estimate_bytes: usize,
}

impl std::fmt::Display for ForestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "KdForest {{ points: {}, dim: {}, trees: {}, nodes: {}, leaves: {}, \
             avg_leaf: {:.1}, max_depth: {}, mem: ~{:.1}MB }}",
            self.num_points,
            self.dimension,
            self.num_trees,
            self.total_nodes,
            self.total_leaves,
            self.avg_leaf_size,
            self.max_depth,
            self.memory_estimate_bytes as f64 / (1024.0 * 1024.0),
        )
    }
}

// ---------------------------------------------------------------------------
// Inner state (behind RwLock)
// ---------------------------------------------------------------------------

pub(crate) struct ForestInner<T: Element> {
    pub(crate) config: ForestConfig,
    pub(crate) points: Option<Arc<Array2<T>>>,
    pub(crate) trees: Vec<PartitionTree<T>>,
}

impl<T: Element> ForestInner<T> {
    /// The point set and trees of a built forest, or `NotBuilt`.
    pub(crate) fn built(&self) -> Result<(&Array2<T>, &[PartitionTree<T>])> {
        match &self.points {
            Some(points) => Ok((points.as_ref(), &self.trees)),
            None => Err(KdForestError::NotBuilt),
        }
    }
}

// ---------------------------------------------------------------------------
// KdForest
// ---------------------------------------------------------------------------

/// An ensemble of randomized partition trees for approximate (and, at
/// unlimited budget, exact) nearest-neighbor search.
///
/// The forest is built exactly once from a fixed point set and is read-only
/// afterwards. Thread-safe: wrap it in an `Arc` and any number of
/// [`Searcher`]s may query it concurrently; each searcher owns its entire
/// mutable state.
pub struct KdForest<T: Element> {
    pub(crate) inner: RwLock<ForestInner<T>>,
    pub(crate) metrics: Option<Arc<MetricsCollector>>,
}

impl<T: Element> std::fmt::Debug for KdForest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("KdForest")
            .field("dim", &inner.config.dim)
            .field("num_trees", &inner.config.num_trees)
            .field("built", &inner.points.is_some())
            .field("has_metrics", &self.metrics.is_some())
            .finish()
    }
}

impl<T: Element> KdForest<T> {
    /// Start configuring a forest with the builder pattern.
    pub fn builder() -> KdForestBuilder<T> {
        KdForestBuilder::new()
    }

    /// Create an unbuilt forest directly from a [`ForestConfig`].
    pub fn new(config: ForestConfig) -> Result<Self> {
        Self::new_with_metrics(config, false)
    }

    fn new_with_metrics(config: ForestConfig, enable_metrics: bool) -> Result<Self> {
        if config.dim == 0 {
            return Err(KdForestError::ZeroDimension);
        }
        if config.num_trees == 0 {
            return Err(KdForestError::InvalidConfig(
                "num_trees must be > 0".into(),
            ));
        }

        let inner = ForestInner {
            config,
            points: None,
            trees: Vec::new(),
        };

        let metrics = if enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        Ok(Self {
            inner: RwLock::new(inner),
            metrics,
        })
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    /// Bind the point set and construct all trees.
    ///
    /// Rows of `points` are the indexed vectors; the array is shared, never
    /// copied. Fails with [`KdForestError::AlreadyBuilt`] on a built forest,
    /// [`KdForestError::EmptyPointSet`] when there are no rows, and
    /// [`KdForestError::DimensionMismatch`] when the column count differs
    /// from the configured dimensionality.
    pub fn build(&self, points: Arc<Array2<T>>) -> Result<()> {
        let mut inner = self.inner.write();
        let seeds = prepare_build(&mut inner, &points)?;

        let thresholding = inner.config.thresholding;
        let view = points.view();
        let trees: Vec<PartitionTree<T>> = seeds
            .into_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                PartitionTree::build(&view, thresholding, &mut rng)
            })
            .collect();

        inner.trees = trees;
        inner.points = Some(points);

        if let Some(ref m) = self.metrics {
            m.record_build();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Set the per-query comparison budget; 0 means unlimited.
    ///
    /// May be called before or after build; it affects queries started
    /// afterwards, never the tree structure.
    pub fn set_max_comparisons(&self, max_comparisons: usize) {
        self.inner.write().config.max_comparisons = max_comparisons;
    }

    /// Current per-query comparison budget (0 = unlimited).
    pub fn max_comparisons(&self) -> usize {
        self.inner.read().config.max_comparisons
    }

    /// Set the split-threshold policy.
    ///
    /// Only valid before [`build`](Self::build): the policy shapes the trees
    /// themselves.
    pub fn set_thresholding(&self, thresholding: ThresholdingMethod) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.points.is_some() {
            return Err(KdForestError::AlreadyBuilt);
        }
        inner.config.thresholding = thresholding;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Number of trees in the ensemble.
    pub fn num_trees(&self) -> usize {
        self.inner.read().config.num_trees
    }

    /// Dimensionality of indexed vectors.
    pub fn dim(&self) -> usize {
        self.inner.read().config.dim
    }

    /// Identifier of the scalar element type (`"f32"` or `"f64"`).
    pub fn element_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    /// Node count of tree `index`; valid once built.
    pub fn tree_node_count(&self, index: usize) -> Result<usize> {
        let inner = self.inner.read();
        let (_, trees) = inner.built()?;
        trees
            .get(index)
            .map(PartitionTree::node_count)
            .ok_or(KdForestError::InvalidTreeIndex(index))
    }

    /// Number of indexed points (0 before build).
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .points
            .as_ref()
            .map(|p| p.nrows())
            .unwrap_or(0)
    }

    /// True when no points are bound yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`build`](Self::build) has completed.
    pub fn is_built(&self) -> bool {
        self.inner.read().points.is_some()
    }

    /// Shared handle to the bound point set.
    pub fn points(&self) -> Result<Arc<Array2<T>>> {
        self.inner
            .read()
            .points
            .clone()
            .ok_or(KdForestError::NotBuilt)
    }

    /// Return a clone of the current configuration.
    pub fn config(&self) -> ForestConfig {
        self.inner.read().config.clone()
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// Create a reusable [`Searcher`] bound to this forest.
    ///
    /// Fails with [`KdForestError::NotBuilt`] before [`build`](Self::build).
    pub fn searcher(&self) -> Result<Searcher<'_, T>> {
        Searcher::new(self)
    }

    /// One-shot query through a throwaway searcher.
    ///
    /// Prefer a long-lived [`Searcher`] when issuing many queries.
    pub fn query(&self, query: &[T], k: usize) -> Result<Vec<Neighbor<T>>> {
        self.searcher()?.query(query, k)
    }

    // ------------------------------------------------------------------
    // Stats / metrics
    // ------------------------------------------------------------------

    /// Compute aggregate statistics about the forest.
    pub fn stats(&self) -> ForestStats {
        let inner = self.inner.read();
        let num_points = inner.points.as_ref().map(|p| p.nrows()).unwrap_or(0);

        let mut total_nodes = 0;
        let mut total_leaves = 0;
        let mut max_leaf_size = 0;
        let mut max_depth = 0;
        let mut tree_mem = 0;
        for tree in &inner.trees {
            total_nodes += tree.node_count();
            let (leaves, max_leaf) = tree.leaf_stats();
            total_leaves += leaves;
            max_leaf_size = max_leaf_size.max(max_leaf);
            max_depth = max_depth.max(tree.depth());
            tree_mem += tree.memory_bytes();
        }

        let avg_leaf_size = if total_leaves > 0 {
            (num_points * inner.trees.len()) as f64 / total_leaves as f64
        } else {
            0.0
        };

        let point_mem = num_points * inner.config.dim * std::mem::size_of::<T>();

        ForestStats {
            num_points,
            dimension: inner.config.dim,
            num_trees: inner.config.num_trees,
            total_nodes,
            total_leaves,
            avg_leaf_size,
            max_leaf_size,
            max_depth,
            memory_estimate_bytes: point_mem + tree_mem,
        }
    }

    /// Snapshot of runtime metrics (`None` if metrics were not enabled).
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    /// Reset metrics counters.
    pub fn reset_metrics(&self) {
        if let Some(ref m) = self.metrics {
            m.reset();
        }
    }
}

/// Validate a build request and derive one RNG seed per tree from the
/// configured master seed, so sequential and parallel builds produce the
/// identical forest.
fn prepare_build<T: Element>(
    inner: &mut ForestInner<T>,
    points: &Arc<Array2<T>>,
) -> Result<Vec<u64>> {
    if inner.points.is_some() {
        return Err(KdForestError::AlreadyBuilt);
    }
    if points.nrows() == 0 {
        return Err(KdForestError::EmptyPointSet);
    }
    if points.ncols() != inner.config.dim {
        return Err(KdForestError::DimensionMismatch {
            expected: inner.config.dim,
            got: points.ncols(),
        });
    }

    let mut master = match inner.config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Ok((0..inner.config.num_trees).map(|_| master.gen()).collect())
}

// ---------------------------------------------------------------------------
// Parallel ops (behind `parallel` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "parallel")]
impl<T: Element> KdForest<T> {
    /// Like [`build`](Self::build), constructing trees in parallel with
    /// rayon, one task per tree. Produces the identical forest for a fixed
    /// seed.
    pub fn par_build(&self, points: Arc<Array2<T>>) -> Result<()> {
        use rayon::prelude::*;

        let mut inner = self.inner.write();
        let seeds = prepare_build(&mut inner, &points)?;

        let thresholding = inner.config.thresholding;
        let view = points.view();
        let trees: Vec<PartitionTree<T>> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                PartitionTree::build(&view, thresholding, &mut rng)
            })
            .collect();

        inner.trees = trees;
        inner.points = Some(points);

        if let Some(ref m) = self.metrics {
            m.record_build();
        }
        Ok(())
    }

    /// Run many independent queries in parallel, each through its own
    /// searcher.
    pub fn par_query_batch(&self, queries: &[Vec<T>], k: usize) -> Result<Vec<Vec<Neighbor<T>>>> {
        use rayon::prelude::*;

        queries.par_iter().map(|q| self.query(q, k)).collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`KdForest`].
pub struct KdForestBuilder<T: Element> {
    config: ForestConfig,
    enable_metrics: bool,
    _element: PhantomData<T>,
}

impl<T: Element> Default for KdForestBuilder<T> {
    fn default() -> Self {
        Self {
            config: ForestConfig::default(),
            enable_metrics: false,
            _element: PhantomData,
        }
    }
}

impl<T: Element> KdForestBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dim(mut self, dim: usize) -> Self {
        self.config.dim = dim;
        self
    }

    pub fn num_trees(mut self, n: usize) -> Self {
        self.config.num_trees = n;
        self
    }

    pub fn distance_metric(mut self, m: DistanceMetric) -> Self {
        self.config.distance_metric = m;
        self
    }

    pub fn thresholding(mut self, t: ThresholdingMethod) -> Self {
        self.config.thresholding = t;
        self
    }

    pub fn max_comparisons(mut self, n: usize) -> Self {
        self.config.max_comparisons = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn enable_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Create the (unbuilt) forest, returning an error on invalid
    /// configuration.
    pub fn build(self) -> Result<KdForest<T>> {
        KdForest::new_with_metrics(self.config, self.enable_metrics)
    }
}
