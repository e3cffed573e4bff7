//! Tessera: an embedded graph storage engine.
//!
//! Nodes and edges live in memory behind a write-ahead log that makes every
//! mutation durable before it becomes visible. Node vector properties can be
//! indexed for approximate nearest-neighbor search, and a set of read-only
//! graph algorithms runs over the stored graph.
//!
//! ```no_run
//! use tessera::{EdgeSpec, GraphStore, NodeSpec, StoreOptions};
//!
//! # fn main() -> tessera::Result<()> {
//! let graph = GraphStore::open(StoreOptions::new("/var/lib/tessera"))?;
//! let ada = graph.create_node(NodeSpec::new(["Person"]).property("name", "ada"))?;
//! let bob = graph.create_node(NodeSpec::new(["Person"]).property("name", "bob"))?;
//! graph.create_edge(EdgeSpec::new(ada.id, bob.id, "KNOWS"))?;
//! let path = tessera::algorithms::shortest_path(&graph, ada.id, bob.id, &graph.deadline())?;
//! assert!(path.found);
//! graph.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod algorithms;
pub mod primitives;
pub mod storage;
pub mod types;
pub mod vector;

pub use primitives::concurrency::{CancelToken, Deadline};
pub use primitives::wal::WalSyncMode;
pub use storage::{
    Edge, EdgeSpec, GraphStore, Node, NodeSpec, Statistics, StoreConfig, StoreOptions,
};
pub use types::{EdgeId, Entity, ErrorKind, GraphError, Lsn, NodeId, Properties, Result, Value};
pub use vector::{VectorHit, VectorMetric};
