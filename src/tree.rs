use std::cmp::Ordering;

use ndarray::ArrayView2;
use rand::Rng;

use crate::element::Element;

/// Policy for choosing a split node's decision value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdingMethod {
    /// Split at the upper median of the chosen dimension. Balanced splits,
    /// depth bounded by O(log n).
    #[default]
    Median,
    /// Split at the arithmetic mean. Cheaper, may be unbalanced on skewed
    /// data.
    Mean,
}

/// Maximum number of points a leaf may hold before it is split.
pub(crate) const LEAF_CAPACITY: usize = 16;

/// Hard recursion cutoff; a subtree at this depth becomes a leaf.
pub(crate) const MAX_DEPTH: usize = 64;

/// Per-dimension spread is estimated over at most this many points.
const VARIANCE_SAMPLE_CAP: usize = 1024;

/// The split dimension is drawn uniformly from this many top-variance
/// dimensions, decorrelating the trees of a forest.
const SPLIT_DIM_CANDIDATES: usize = 5;

/// One node of a partition tree.
#[derive(Debug, Clone)]
pub(crate) enum Node<T> {
    Split {
        dim: usize,
        threshold: T,
        lower: u32,
        upper: u32,
    },
    /// Range [start..end) into the tree's permuted `indices` array.
    Leaf { start: u32, end: u32 },
}

/// One randomized binary space-partitioning tree over the point set.
///
/// Array-backed and immutable after construction. Leaves reference disjoint
/// ranges of a permuted point-index array, so every point index appears in
/// exactly one leaf.
#[derive(Debug, Clone)]
pub struct PartitionTree<T> {
    nodes: Vec<Node<T>>,
    indices: Vec<u32>,
    root: u32,
}

impl<T: Element> PartitionTree<T> {
    /// Build a tree over all rows of `points`, drawing split-dimension
    /// choices from `rng`.
    pub(crate) fn build<R: Rng>(
        points: &ArrayView2<T>,
        thresholding: ThresholdingMethod,
        rng: &mut R,
    ) -> Self {
        let n = points.nrows();
        let mut indices: Vec<u32> = (0..n as u32).collect();
        let mut nodes = Vec::with_capacity(2 * n / LEAF_CAPACITY + 1);
        let root = build_subtree(points, thresholding, rng, &mut nodes, &mut indices, 0, 0);
        Self {
            nodes,
            indices,
            root,
        }
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn root(&self) -> u32 {
        self.root
    }

    pub(crate) fn node(&self, index: u32) -> &Node<T> {
        &self.nodes[index as usize]
    }

    pub(crate) fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of leaves and size of the largest leaf.
    pub(crate) fn leaf_stats(&self) -> (usize, usize) {
        let mut leaves = 0;
        let mut max_leaf = 0;
        for node in &self.nodes {
            if let Node::Leaf { start, end } = node {
                leaves += 1;
                max_leaf = max_leaf.max((end - start) as usize);
            }
        }
        (leaves, max_leaf)
    }

    /// Depth of the deepest node (root at depth 0).
    pub(crate) fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { lower, upper, .. } = self.node(idx) {
                stack.push((*lower, depth + 1));
                stack.push((*upper, depth + 1));
            }
        }
        max_depth
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.nodes.len() * std::mem::size_of::<Node<T>>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }
}

fn build_subtree<T: Element, R: Rng>(
    points: &ArrayView2<T>,
    thresholding: ThresholdingMethod,
    rng: &mut R,
    nodes: &mut Vec<Node<T>>,
    indices: &mut [u32],
    offset: u32,
    depth: usize,
) -> u32 {
    let count = indices.len();
    if count <= LEAF_CAPACITY || depth >= MAX_DEPTH {
        nodes.push(Node::Leaf {
            start: offset,
            end: offset + count as u32,
        });
        return (nodes.len() - 1) as u32;
    }

    let dim = match choose_split_dimension(points, indices, rng) {
        Some(dim) => dim,
        // Zero spread on every dimension: the points cannot be separated.
        None => {
            nodes.push(Node::Leaf {
                start: offset,
                end: offset + count as u32,
            });
            return (nodes.len() - 1) as u32;
        }
    };

    // Deterministic layout: order the subset by value along the split
    // dimension, ties by point index.
    indices.sort_unstable_by(|&a, &b| {
        let va = points[[a as usize, dim]];
        let vb = points[[b as usize, dim]];
        va.partial_cmp(&vb)
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let threshold = select_threshold(points, indices, dim, thresholding);
    let split_at = indices.partition_point(|&i| points[[i as usize, dim]] < threshold);

    let node_idx = nodes.len();
    // Placeholder, patched once both children exist.
    nodes.push(Node::Leaf { start: 0, end: 0 });

    let (lo, hi) = indices.split_at_mut(split_at);
    let lower = build_subtree(points, thresholding, rng, nodes, lo, offset, depth + 1);
    let upper = build_subtree(
        points,
        thresholding,
        rng,
        nodes,
        hi,
        offset + split_at as u32,
        depth + 1,
    );

    nodes[node_idx] = Node::Split {
        dim,
        threshold,
        lower,
        upper,
    };
    node_idx as u32
}

/// Pick the split dimension: uniformly among the highest-variance dimensions
/// of the current subset. Returns `None` when every dimension has zero
/// spread.
fn choose_split_dimension<T: Element, R: Rng>(
    points: &ArrayView2<T>,
    indices: &[u32],
    rng: &mut R,
) -> Option<usize> {
    let dims = points.ncols();
    let stride = (indices.len() / VARIANCE_SAMPLE_CAP).max(1);

    let mut candidates: Vec<(usize, f64)> = Vec::with_capacity(dims);
    for d in 0..dims {
        let mut count = 0usize;
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;
        // Welford over an evenly strided sample of the subset.
        for &i in indices.iter().step_by(stride) {
            let v = points[[i as usize, d]].to_f64().unwrap_or(0.0);
            count += 1;
            let delta = v - mean;
            mean += delta / count as f64;
            m2 += delta * (v - mean);
        }
        if count > 1 && m2 > 0.0 {
            candidates.push((d, m2 / count as f64));
        }
    }
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    candidates.truncate(SPLIT_DIM_CANDIDATES);
    let pick = rng.gen_range(0..candidates.len());
    Some(candidates[pick].0)
}

/// Decision value for a split along `dim` of the (sorted) subset.
///
/// The returned threshold always leaves both children non-empty under the
/// `value < threshold` / `value >= threshold` convention: a threshold that
/// collapses onto the subset minimum advances to the next distinct value.
fn select_threshold<T: Element>(
    points: &ArrayView2<T>,
    sorted: &[u32],
    dim: usize,
    thresholding: ThresholdingMethod,
) -> T {
    let value = |i: usize| points[[sorted[i] as usize, dim]];
    let n = sorted.len();
    let min_v = value(0);
    let max_v = value(n - 1);

    let mut threshold = match thresholding {
        ThresholdingMethod::Median => value(n / 2),
        ThresholdingMethod::Mean => {
            let sum: f64 = sorted
                .iter()
                .map(|&i| points[[i as usize, dim]].to_f64().unwrap_or(0.0))
                .sum();
            T::from_f64(sum / n as f64).unwrap_or(min_v)
        }
    };

    if threshold > max_v {
        threshold = max_v;
    }
    if threshold <= min_v {
        // Heavy ties at the minimum would empty the lower child; advance to
        // the first distinct value. The caller guarantees one exists.
        for i in 1..n {
            if value(i) > min_v {
                threshold = value(i);
                break;
            }
        }
    }
    threshold
}
