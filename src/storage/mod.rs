//! Graph storage engine.
//!
//! Holds node and edge tables in memory, makes every mutation durable through
//! the write-ahead log before applying it, and keeps vector indexes over node
//! properties in step with the tables.

mod graph;
mod metrics;
mod model;
mod options;
mod record;

/// Store handle and lifecycle.
pub use graph::{GraphStore, OpenReport, MAX_BATCH_SIZE, SNAPSHOT_FILE_NAME, WAL_FILE_NAME};

/// Metrics hooks and statistics.
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, Statistics, StorageMetrics};

/// Stored records and creation inputs.
pub use model::{Edge, EdgeSpec, Node, NodeSpec};

/// Store configuration.
pub use options::{StoreConfig, StoreOptions, DEFAULT_HNSW_SEED};
