use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use ndarray::ArrayView1;

use crate::distance::DistanceMetric;
use crate::element::Element;
use crate::error::{KdForestError, Result};
use crate::forest::KdForest;
use crate::metrics::{MetricsCollector, QueryTimer};
use crate::tree::Node;

/// A single nearest-neighbor result.
///
/// `distance` follows the metric's own convention: results are ascending for
/// distance metrics and descending for similarity metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<T> {
    /// Row index of the point in the bound point set.
    pub index: usize,
    /// Exact score of that point against the query.
    pub distance: T,
}

// ---------------------------------------------------------------------------
// Priority frontier
// ---------------------------------------------------------------------------

/// A pending tree node, keyed by a lower bound on the score of any point it
/// can still contribute. Ordered so the smallest bound pops first; ties break
/// on (tree, node) for deterministic traversal.
struct FrontierEntry<T> {
    bound: T,
    tree: u32,
    node: u32,
}

impl<T: Element> PartialEq for FrontierEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Element> Eq for FrontierEntry<T> {}

impl<T: Element> PartialOrd for FrontierEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Element> Ord for FrontierEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, the search wants min-bound-first.
        other
            .bound
            .partial_cmp(&self.bound)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

// ---------------------------------------------------------------------------
// Bounded k-best holder
// ---------------------------------------------------------------------------

/// Candidate in the internal key order (smaller is closer). Equal keys break
/// ties by ascending point index.
struct Candidate<T> {
    key: T,
    index: u32,
}

impl<T: Element> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Element> Eq for Candidate<T> {}

impl<T: Element> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Element> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .partial_cmp(&other.key)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Max-structure of capacity `k` keeping the current k-best candidates; the
/// worst kept candidate sits on top.
struct ResultHeap<T> {
    heap: BinaryHeap<Candidate<T>>,
    capacity: usize,
}

impl<T: Element> ResultHeap<T> {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity: 0,
        }
    }

    fn reset(&mut self, capacity: usize) {
        self.heap.clear();
        self.capacity = capacity;
    }

    fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Key of the worst kept candidate; only meaningful once full.
    fn worst_key(&self) -> Option<T> {
        self.heap.peek().map(|c| c.key)
    }

    /// Offer a candidate. Once full, it is kept only when strictly better
    /// than the current worst (equal keys win on smaller index).
    fn offer(&mut self, key: T, index: u32) {
        if self.capacity == 0 {
            return;
        }
        let candidate = Candidate { key, index };
        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate.cmp(worst) == Ordering::Less {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    /// Move all kept candidates into `out`, best first.
    fn drain_sorted_into(&mut self, out: &mut Vec<Candidate<T>>) {
        out.clear();
        out.extend(self.heap.drain());
        out.sort_unstable();
    }
}

// ---------------------------------------------------------------------------
// Searcher
// ---------------------------------------------------------------------------

/// Per-query traversal context bound to a built, immutable [`KdForest`].
///
/// Reusable across queries: internal state is reset at the start of each
/// query, not reallocated. Any number of searchers may operate concurrently
/// over one forest; each owns its entire mutable state and may be dropped at
/// any time, independently of the forest and of other searchers.
pub struct Searcher<'a, T: Element> {
    forest: &'a KdForest<T>,
    metrics: Option<Arc<MetricsCollector>>,
    frontier: BinaryHeap<FrontierEntry<T>>,
    results: ResultHeap<T>,
    /// Generation stamps marking points already evaluated in this query.
    visited: Vec<u64>,
    generation: u64,
    scratch: Vec<Candidate<T>>,
}

impl<'a, T: Element> Searcher<'a, T> {
    pub(crate) fn new(forest: &'a KdForest<T>) -> Result<Self> {
        let num_points = {
            let inner = forest.inner.read();
            let (points, _) = inner.built()?;
            points.nrows()
        };

        Ok(Self {
            forest,
            metrics: forest.metrics.clone(),
            frontier: BinaryHeap::new(),
            results: ResultHeap::new(),
            visited: vec![0; num_points],
            generation: 0,
            scratch: Vec::new(),
        })
    }

    /// Find up to `k` nearest neighbors of `query`, best first.
    ///
    /// Priority search across every tree of the forest under the forest's
    /// comparison budget (0 = unlimited, which guarantees the exact top-k).
    /// Returns fewer than `k` entries when the point set is smaller than
    /// `k`; `k == 0` returns an empty result without doing any work.
    pub fn query(&mut self, query: &[T], k: usize) -> Result<Vec<Neighbor<T>>> {
        let timer = self.metrics.as_ref().map(|_| QueryTimer::new());
        let inner = self.forest.inner.read();
        let (points, trees) = inner.built()?;

        if query.len() != inner.config.dim {
            return Err(KdForestError::DimensionMismatch {
                expected: inner.config.dim,
                got: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let metric = inner.config.distance_metric;
        let budget = inner.config.max_comparisons;
        let prune = metric.supports_pruning();
        let q = ArrayView1::from(query);

        self.generation += 1;
        self.frontier.clear();
        self.results.reset(k);

        for (tree_idx, tree) in trees.iter().enumerate() {
            self.frontier.push(FrontierEntry {
                bound: T::zero(),
                tree: tree_idx as u32,
                node: tree.root(),
            });
        }

        let mut comparisons = 0usize;
        let mut exhausted = false;
        let mut terminated = false;

        'frontier: while let Some(entry) = self.frontier.pop() {
            // Branch-and-bound: the frontier is min-ordered, so once the best
            // remaining bound cannot beat the worst kept candidate, nothing
            // can.
            if prune && self.results.is_full() {
                if let Some(worst) = self.results.worst_key() {
                    if entry.bound > worst {
                        terminated = true;
                        break;
                    }
                }
            }

            let tree = &trees[entry.tree as usize];
            let mut node_idx = entry.node;
            loop {
                match tree.node(node_idx) {
                    Node::Split {
                        dim,
                        threshold,
                        lower,
                        upper,
                    } => {
                        if budget != 0 && comparisons >= budget {
                            exhausted = true;
                            break 'frontier;
                        }
                        comparisons += 1;

                        let value = query[*dim];
                        // Tie convention matches the build: values equal to
                        // the threshold fall on the upper side.
                        let (near, far) = if value < *threshold {
                            (*lower, *upper)
                        } else {
                            (*upper, *lower)
                        };
                        self.frontier.push(FrontierEntry {
                            bound: metric.hyperplane_margin(value - *threshold),
                            tree: entry.tree,
                            node: far,
                        });
                        node_idx = near;
                    }
                    Node::Leaf { start, end } => {
                        for &point in &tree.indices()[*start as usize..*end as usize] {
                            let point_idx = point as usize;
                            if self.visited[point_idx] == self.generation {
                                continue;
                            }
                            if budget != 0 && comparisons >= budget {
                                exhausted = true;
                                break 'frontier;
                            }
                            comparisons += 1;
                            self.visited[point_idx] = self.generation;

                            let score = metric.compute(&q, &points.row(point_idx));
                            self.results.offer(metric.key(score), point);
                        }
                        break;
                    }
                }
            }
        }

        self.results.drain_sorted_into(&mut self.scratch);
        let neighbors: Vec<Neighbor<T>> = self
            .scratch
            .iter()
            .map(|c| Neighbor {
                index: c.index as usize,
                distance: metric.score(c.key),
            })
            .collect();

        drop(inner);
        if let (Some(m), Some(t)) = (&self.metrics, timer) {
            m.record_query(comparisons as u64, t.elapsed_ns(), exhausted, terminated);
        }

        Ok(neighbors)
    }
}
