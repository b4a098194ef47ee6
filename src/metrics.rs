use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Collects runtime statistics about forest operations using lock-free
/// atomic counters.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    build_count: AtomicU64,
    query_count: AtomicU64,
    total_comparisons: AtomicU64,
    total_query_time_ns: AtomicU64,
    budget_exhausted_count: AtomicU64,
    bound_terminated_count: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_build(&self) {
        self.build_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(
        &self,
        comparisons: u64,
        duration_ns: u64,
        budget_exhausted: bool,
        bound_terminated: bool,
    ) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.total_comparisons
            .fetch_add(comparisons, Ordering::Relaxed);
        self.total_query_time_ns
            .fetch_add(duration_ns, Ordering::Relaxed);
        if budget_exhausted {
            self.budget_exhausted_count.fetch_add(1, Ordering::Relaxed);
        }
        if bound_terminated {
            self.bound_terminated_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a point-in-time snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let query_count = self.query_count.load(Ordering::Relaxed);
        let total_comparisons = self.total_comparisons.load(Ordering::Relaxed);
        let total_query_time_ns = self.total_query_time_ns.load(Ordering::Relaxed);
        let exhausted = self.budget_exhausted_count.load(Ordering::Relaxed);
        let terminated = self.bound_terminated_count.load(Ordering::Relaxed);

        MetricsSnapshot {
            build_count: self.build_count.load(Ordering::Relaxed),
            query_count,
            avg_query_time_us: if query_count > 0 {
                total_query_time_ns as f64 / query_count as f64 / 1000.0
            } else {
                0.0
            },
            avg_comparisons_per_query: if query_count > 0 {
                total_comparisons as f64 / query_count as f64
            } else {
                0.0
            },
            budget_exhaustion_rate: if query_count > 0 {
                exhausted as f64 / query_count as f64
            } else {
                0.0
            },
            bound_termination_rate: if query_count > 0 {
                terminated as f64 / query_count as f64
            } else {
                0.0
            },
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.build_count.store(0, Ordering::Relaxed);
        self.query_count.store(0, Ordering::Relaxed);
        self.total_comparisons.store(0, Ordering::Relaxed);
        self.total_query_time_ns.store(0, Ordering::Relaxed);
        self.budget_exhausted_count.store(0, Ordering::Relaxed);
        self.bound_terminated_count.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of forest metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub build_count: u64,
    pub query_count: u64,
    pub avg_query_time_us: f64,
    pub avg_comparisons_per_query: f64,
    /// Fraction of queries that stopped on the comparison budget.
    pub budget_exhaustion_rate: f64,
    /// Fraction of queries that stopped on the branch-and-bound cutoff.
    pub bound_termination_rate: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Queries: {}, Builds: {}, Avg query: {:.2}us, Avg comparisons: {:.1}, \
             Budget-limited: {:.1}%, Bound-limited: {:.1}%",
            self.query_count,
            self.build_count,
            self.avg_query_time_us,
            self.avg_comparisons_per_query,
            self.budget_exhaustion_rate * 100.0,
            self.bound_termination_rate * 100.0,
        )
    }
}

/// RAII timer for measuring operation durations.
pub(crate) struct QueryTimer {
    start: Instant,
}

impl QueryTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}
