//! Read-only graph algorithms.
//!
//! Every algorithm reads the graph through [`GraphRead`] and takes a
//! [`Deadline`](crate::Deadline) that is checked at loop boundaries, so a
//! long run stops with [`GraphError::Timeout`](crate::GraphError::Timeout)
//! instead of running to completion. Algorithms hold no lock between calls
//! and may observe a graph that is being mutated concurrently.

use rustc_hash::FxHashMap;

use crate::primitives::concurrency::Deadline;
use crate::storage::{Edge, Node};
use crate::types::{NodeId, Result};

mod centrality;
mod components;
mod cycles;
mod pagerank;
mod shortest_path;
mod topology;
mod traversal;

pub use centrality::{
    betweenness_centrality, closeness_centrality, degree_centrality, edge_betweenness_centrality,
};
pub use components::{connected_components, is_connected, Components};
pub use cycles::{
    detect_cycles, has_cycle, Cycle, CycleOptions, CycleReport, CycleStats, MAX_CYCLE_LENGTH,
};
pub use pagerank::{
    pagerank, PageRankOptions, PageRankResult, DEFAULT_DAMPING_FACTOR,
    DEFAULT_PAGERANK_ITERATIONS, MAX_PAGERANK_ITERATIONS, PAGERANK_TOLERANCE,
};
pub use shortest_path::{
    all_shortest_paths, shortest_path, weighted_shortest_path, PathResult, WeightedPath,
};
pub use topology::{bipartition, is_dag, topological_sort};
pub use traversal::{
    traverse, TraversalOptions, TraversalOrder, Visit, DEFAULT_TRAVERSAL_DEPTH,
    MAX_TRAVERSAL_DEPTH,
};

/// Read access the algorithms need.
pub trait GraphRead {
    /// The node, or `NotFound`.
    fn node(&self, id: NodeId) -> Result<Node>;

    /// Whether a live node has this id.
    fn contains_node(&self, id: NodeId) -> Result<bool>;

    /// Edges leaving `id`, in creation order; `NotFound` if the node is gone.
    fn outgoing(&self, id: NodeId) -> Result<Vec<Edge>>;

    /// Ids of every live node, ascending.
    fn node_ids(&self) -> Result<Vec<NodeId>>;
}

/// Outgoing edges of a node reached mid-run; a node deleted under the run
/// reads as having none.
pub(crate) fn outgoing_or_empty<G: GraphRead + ?Sized>(
    graph: &G,
    id: NodeId,
) -> Result<Vec<Edge>> {
    match graph.outgoing(id) {
        Ok(edges) => Ok(edges),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

/// Point-in-time copy of the edge structure for whole-graph algorithms.
///
/// Holds one entry per edge, so parallel edges repeat a target. Edges into
/// nodes that are not live at load time are dropped.
pub(crate) struct Adjacency {
    pub(crate) ids: Vec<NodeId>,
    pub(crate) out: FxHashMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    /// Reads every live node and its outgoing edges, checking `deadline`
    /// once per node.
    pub(crate) fn load<G: GraphRead + ?Sized>(graph: &G, deadline: &Deadline) -> Result<Self> {
        deadline.check()?;
        let ids = graph.node_ids()?;
        let mut out: FxHashMap<NodeId, Vec<NodeId>> =
            ids.iter().map(|&id| (id, Vec::new())).collect();
        for &id in &ids {
            deadline.check()?;
            let targets: Vec<NodeId> = outgoing_or_empty(graph, id)?
                .into_iter()
                .map(|e| e.to)
                .filter(|to| out.contains_key(to))
                .collect();
            out.insert(id, targets);
        }
        Ok(Self { ids, out })
    }

    pub(crate) fn targets(&self, id: NodeId) -> &[NodeId] {
        self.out.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Neighbors in either direction, self-loops included once per edge end.
    pub(crate) fn undirected(&self) -> FxHashMap<NodeId, Vec<NodeId>> {
        let mut both: FxHashMap<NodeId, Vec<NodeId>> =
            self.ids.iter().map(|&id| (id, Vec::new())).collect();
        for (&from, targets) in &self.out {
            for &to in targets {
                if let Some(list) = both.get_mut(&from) {
                    list.push(to);
                }
                if let Some(list) = both.get_mut(&to) {
                    list.push(from);
                }
            }
        }
        both
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::storage::{EdgeSpec, GraphStore, NodeSpec, StoreOptions};
    use crate::types::NodeId;
    use crate::WalSyncMode;

    /// Store with nodes `1..=n` and the given `(from, to)` edges of type `E`.
    pub(crate) fn graph(n: usize, edges: &[(u64, u64)]) -> GraphStore {
        weighted_graph(n, &edges.iter().map(|&(a, b)| (a, b, 1.0)).collect::<Vec<_>>())
    }

    pub(crate) fn weighted_graph(n: usize, edges: &[(u64, u64, f64)]) -> GraphStore {
        let store =
            GraphStore::open(StoreOptions::in_memory().wal_sync(WalSyncMode::Off)).unwrap();
        for _ in 0..n {
            store.create_node(NodeSpec::default()).unwrap();
        }
        for &(from, to, weight) in edges {
            store
                .create_edge(EdgeSpec::new(NodeId(from), NodeId(to), "E").weight(weight))
                .unwrap();
        }
        store
    }

    /// A directed ring `1 -> 2 -> .. -> n -> 1`.
    pub(crate) fn ring(n: u64) -> GraphStore {
        let edges: Vec<(u64, u64)> = (1..=n).map(|i| (i, i % n + 1)).collect();
        graph(n as usize, &edges)
    }
}
