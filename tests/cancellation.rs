mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tessera::algorithms::{
    all_shortest_paths, betweenness_centrality, bipartition, closeness_centrality,
    connected_components, degree_centrality, detect_cycles, has_cycle, pagerank,
    shortest_path, topological_sort, traverse, weighted_shortest_path, CycleOptions, GraphRead,
    PageRankOptions, TraversalOptions,
};
use tessera::{
    CancelToken, Deadline, Edge, EdgeSpec, ErrorKind, GraphStore, Node, NodeId, NodeSpec, Result,
};

const SIDE: usize = 8;
/// Reads served before the token is cancelled.
const READS_BEFORE_CANCEL: usize = 6;

/// Forwards reads to a store and cancels `token` once `budget` reads have
/// been served, so the cancel lands in the middle of a run.
struct CancelAfterReads<'a> {
    inner: &'a GraphStore,
    token: CancelToken,
    budget: AtomicUsize,
}

impl<'a> CancelAfterReads<'a> {
    fn new(inner: &'a GraphStore, budget: usize) -> Self {
        Self {
            inner,
            token: CancelToken::new(),
            budget: AtomicUsize::new(budget),
        }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_secs(60)).with_cancel(self.token.clone())
    }

    fn reads_served(&self) -> bool {
        self.token.is_cancelled()
    }

    fn tick(&self) {
        let left = self.budget.fetch_sub(1, Ordering::SeqCst);
        if left <= 1 {
            self.budget.store(0, Ordering::SeqCst);
            self.token.cancel();
        }
    }
}

impl GraphRead for CancelAfterReads<'_> {
    fn node(&self, id: NodeId) -> Result<Node> {
        self.tick();
        GraphRead::node(self.inner, id)
    }

    fn contains_node(&self, id: NodeId) -> Result<bool> {
        self.tick();
        GraphRead::contains_node(self.inner, id)
    }

    fn outgoing(&self, id: NodeId) -> Result<Vec<Edge>> {
        self.tick();
        GraphRead::outgoing(self.inner, id)
    }

    fn node_ids(&self) -> Result<Vec<NodeId>> {
        self.tick();
        GraphRead::node_ids(self.inner)
    }
}

/// Acyclic grid with edges pointing right and down; returns ids row by row.
fn grid(graph: &GraphStore) -> Result<Vec<NodeId>> {
    let mut ids = Vec::with_capacity(SIDE * SIDE);
    for _ in 0..SIDE * SIDE {
        ids.push(graph.create_node(NodeSpec::new(["Cell"]))?.id);
    }
    for row in 0..SIDE {
        for col in 0..SIDE {
            let here = ids[row * SIDE + col];
            if col + 1 < SIDE {
                graph.create_edge(EdgeSpec::new(here, ids[row * SIDE + col + 1], "RIGHT"))?;
            }
            if row + 1 < SIDE {
                graph.create_edge(EdgeSpec::new(here, ids[(row + 1) * SIDE + col], "DOWN"))?;
            }
        }
    }
    Ok(ids)
}

fn assert_cancelled<T: std::fmt::Debug>(
    name: &str,
    reader: &CancelAfterReads<'_>,
    run: Result<T>,
) {
    assert!(reader.reads_served(), "{name} finished before the cancel");
    match run {
        Err(err) => assert_eq!(err.kind(), ErrorKind::Timeout, "{name}: {err}"),
        Ok(value) => panic!("{name} ignored a mid-run cancel: {value:?}"),
    }
}

#[test]
fn every_algorithm_stops_when_cancelled_mid_run() -> Result<()> {
    let graph = common::memory_store();
    let ids = grid(&graph)?;
    let (first, last) = (ids[0], ids[ids.len() - 1]);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = traverse(&reader, first, &TraversalOptions::depth(100), &reader.deadline());
    assert_cancelled("traverse", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = shortest_path(&reader, first, last, &reader.deadline());
    assert_cancelled("shortest_path", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = weighted_shortest_path(&reader, first, last, &reader.deadline());
    assert_cancelled("weighted_shortest_path", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = all_shortest_paths(&reader, first, &reader.deadline());
    assert_cancelled("all_shortest_paths", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = pagerank(&reader, &PageRankOptions::default(), &reader.deadline());
    assert_cancelled("pagerank", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = betweenness_centrality(&reader, &reader.deadline());
    assert_cancelled("betweenness_centrality", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = closeness_centrality(&reader, &reader.deadline());
    assert_cancelled("closeness_centrality", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = degree_centrality(&reader, &reader.deadline());
    assert_cancelled("degree_centrality", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = detect_cycles(&reader, &CycleOptions::default(), &reader.deadline());
    assert_cancelled("detect_cycles", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = has_cycle(&reader, &reader.deadline());
    assert_cancelled("has_cycle", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = connected_components(&reader, &reader.deadline());
    assert_cancelled("connected_components", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = topological_sort(&reader, &reader.deadline());
    assert_cancelled("topological_sort", &reader, run);

    let reader = CancelAfterReads::new(&graph, READS_BEFORE_CANCEL);
    let run = bipartition(&reader, &reader.deadline());
    assert_cancelled("bipartition", &reader, run);
    Ok(())
}

#[test]
fn generous_budget_lets_the_same_runs_finish() -> Result<()> {
    let graph = common::memory_store();
    let ids = grid(&graph)?;
    let reader = CancelAfterReads::new(&graph, usize::MAX);
    let deadline = reader.deadline();
    let path = weighted_shortest_path(&reader, ids[0], ids[ids.len() - 1], &deadline)?;
    assert_eq!(path.distance, (2 * (SIDE - 1)) as f64);
    assert!(!has_cycle(&reader, &deadline)?);
    assert_eq!(topological_sort(&reader, &deadline)?.first(), Some(&ids[0]));
    assert_eq!(connected_components(&reader, &deadline)?.len(), 1);
    assert!(!reader.reads_served());
    Ok(())
}
