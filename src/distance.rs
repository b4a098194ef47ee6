use ndarray::ArrayView1;

use crate::element::Element;

/// Whether smaller or larger scores mean "closer" for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreConvention {
    /// Distances: 0 is identical, larger is farther (L1, L2).
    LowerIsCloser,
    /// Similarities: larger is closer (histogram intersection).
    HigherIsCloser,
}

/// Distance or similarity metric used for nearest-neighbor comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Manhattan (L1) distance. Range [0, inf).
    L1,
    /// Euclidean (L2) distance. Range [0, inf).
    L2,
    /// Histogram intersection kernel: sum of per-component minima.
    /// A similarity -- higher means closer. Intended for non-negative data.
    HistogramIntersection,
}

impl DistanceMetric {
    /// Compute the score between two vectors using this metric.
    pub fn compute<T: Element>(&self, a: &ArrayView1<T>, b: &ArrayView1<T>) -> T {
        match self {
            DistanceMetric::L1 => l1_distance(a, b),
            DistanceMetric::L2 => l2_distance(a, b),
            DistanceMetric::HistogramIntersection => histogram_intersection(a, b),
        }
    }

    /// Ordering convention for scores produced by [`compute`](Self::compute).
    pub fn convention(&self) -> ScoreConvention {
        match self {
            DistanceMetric::L1 | DistanceMetric::L2 => ScoreConvention::LowerIsCloser,
            DistanceMetric::HistogramIntersection => ScoreConvention::HigherIsCloser,
        }
    }

    /// Map a user-facing score into the internal total order where smaller
    /// is always closer. Similarities are negated, distances pass through.
    pub(crate) fn key<T: Element>(&self, score: T) -> T {
        match self.convention() {
            ScoreConvention::LowerIsCloser => score,
            ScoreConvention::HigherIsCloser => -score,
        }
    }

    /// Inverse of [`key`](Self::key): recover the user-facing score.
    pub(crate) fn score<T: Element>(&self, key: T) -> T {
        match self.convention() {
            ScoreConvention::LowerIsCloser => key,
            ScoreConvention::HigherIsCloser => -key,
        }
    }

    /// Lower bound contributed by a split hyperplane at signed offset `delta`
    /// from the query, in the internal key order.
    ///
    /// The perpendicular distance |delta| bounds both the L1 and the L2
    /// distance of every point beyond the hyperplane. No such bound exists
    /// for the intersection kernel, so it contributes zero and relies on the
    /// comparison budget instead.
    pub(crate) fn hyperplane_margin<T: Element>(&self, delta: T) -> T {
        match self {
            DistanceMetric::L1 | DistanceMetric::L2 => delta.abs(),
            DistanceMetric::HistogramIntersection => T::zero(),
        }
    }

    /// True when [`hyperplane_margin`](Self::hyperplane_margin) is a sound
    /// bound, making branch-and-bound termination valid.
    pub(crate) fn supports_pruning(&self) -> bool {
        matches!(self, DistanceMetric::L1 | DistanceMetric::L2)
    }
}

/// Manhattan (L1) distance between two vectors.
pub fn l1_distance<T: Element>(a: &ArrayView1<T>, b: &ArrayView1<T>) -> T {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).abs())
        .sum()
}

/// Euclidean (L2) distance between two vectors.
pub fn l2_distance<T: Element>(a: &ArrayView1<T>, b: &ArrayView1<T>) -> T {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum::<T>()
        .sqrt()
}

/// Histogram intersection kernel: sum of per-component minima.
pub fn histogram_intersection<T: Element>(a: &ArrayView1<T>, b: &ArrayView1<T>) -> T {
    a.iter().zip(b.iter()).map(|(&x, &y)| x.min(y)).sum()
}
