use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Hooks the graph store calls as it mutates and searches.
///
/// Implementations must be cheap; they are invoked on the hot path while
/// the store holds its table lock.
pub trait StorageMetrics: Send + Sync {
    /// Records the creation of a new node in the graph.
    fn node_created(&self);

    /// Records the deletion of a node from the graph.
    fn node_deleted(&self);

    /// Records the creation of a new edge in the graph.
    fn edge_created(&self);

    /// Records the deletion of an edge from the graph.
    fn edge_deleted(&self);

    /// Records a WAL append of `bytes` payload bytes.
    fn wal_appended(&self, bytes: u64);

    /// Records a vector search that returned `hits` results.
    fn vector_search(&self, hits: usize);
}

/// A no-op implementation of [`StorageMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl StorageMetrics for NoopMetrics {
    fn node_created(&self) {}
    fn node_deleted(&self) {}
    fn edge_created(&self) {}
    fn edge_deleted(&self) {}
    fn wal_appended(&self, _bytes: u64) {}
    fn vector_search(&self, _hits: usize) {}
}

/// A thread-safe counter-based implementation of [`StorageMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of nodes created.
    pub nodes_created: AtomicU64,

    /// Number of nodes deleted.
    pub nodes_deleted: AtomicU64,

    /// Number of edges created.
    pub edges_created: AtomicU64,

    /// Number of edges deleted.
    pub edges_deleted: AtomicU64,

    /// Number of WAL entries appended.
    pub wal_appends: AtomicU64,

    /// Payload bytes appended to the WAL.
    pub wal_bytes: AtomicU64,

    /// Number of vector searches served.
    pub vector_searches: AtomicU64,

    /// Total hits returned by vector searches.
    pub vector_hits: AtomicU64,
}

impl StorageMetrics for CounterMetrics {
    fn node_created(&self) {
        self.nodes_created.fetch_add(1, Ordering::Relaxed);
    }

    fn node_deleted(&self) {
        self.nodes_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn edge_created(&self) {
        self.edges_created.fetch_add(1, Ordering::Relaxed);
    }

    fn edge_deleted(&self) {
        self.edges_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn wal_appended(&self, bytes: u64) {
        self.wal_appends.fetch_add(1, Ordering::Relaxed);
        self.wal_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn vector_search(&self, hits: usize) {
        self.vector_searches.fetch_add(1, Ordering::Relaxed);
        self.vector_hits.fetch_add(hits as u64, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
pub fn default_metrics() -> Arc<dyn StorageMetrics> {
    Arc::new(NoopMetrics)
}

/// Point-in-time view of store counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Statistics {
    /// Live nodes.
    pub node_count: u64,
    /// Live edges.
    pub edge_count: u64,
    /// Read operations served since open.
    pub total_queries: u64,
    /// Exponential moving average of read latency in milliseconds.
    pub avg_query_time_ms: f64,
}

/// Weight of the newest sample in the latency average.
const EMA_ALPHA: f64 = 0.1;

/// Lock-free counters behind [`Statistics`].
#[derive(Default)]
pub(crate) struct StatsCounters {
    node_count: AtomicU64,
    edge_count: AtomicU64,
    total_queries: AtomicU64,
    /// f64 bits of the moving average.
    avg_query_bits: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn set_counts(&self, nodes: u64, edges: u64) {
        self.node_count.store(nodes, Ordering::Relaxed);
        self.edge_count.store(edges, Ordering::Relaxed);
    }

    /// Counts one query and folds its latency into the moving average.
    pub(crate) fn record_query(&self, elapsed: Duration) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        let sample = elapsed.as_secs_f64() * 1000.0;
        let mut current = self.avg_query_bits.load(Ordering::Relaxed);
        loop {
            let avg = f64::from_bits(current);
            let next = (1.0 - EMA_ALPHA) * avg + EMA_ALPHA * sample;
            match self.avg_query_bits.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Statistics {
        Statistics {
            node_count: self.node_count.load(Ordering::Relaxed),
            edge_count: self.edge_count.load(Ordering::Relaxed),
            total_queries: self.total_queries.load(Ordering::Relaxed),
            avg_query_time_ms: f64::from_bits(self.avg_query_bits.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_weights_new_samples() {
        let counters = StatsCounters::default();
        counters.record_query(Duration::from_millis(10));
        let first = counters.snapshot();
        assert_eq!(first.total_queries, 1);
        assert!((first.avg_query_time_ms - 1.0).abs() < 1e-9);
        counters.record_query(Duration::from_millis(10));
        let second = counters.snapshot();
        assert!((second.avg_query_time_ms - 1.9).abs() < 1e-9);
    }

    #[test]
    fn counter_metrics_accumulate() {
        let metrics = CounterMetrics::default();
        metrics.wal_appended(10);
        metrics.wal_appended(5);
        metrics.vector_search(3);
        assert_eq!(metrics.wal_appends.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.wal_bytes.load(Ordering::Relaxed), 15);
        assert_eq!(metrics.vector_hits.load(Ordering::Relaxed), 3);
    }
}
