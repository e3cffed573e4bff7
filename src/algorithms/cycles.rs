use rustc_hash::FxHashMap;
use tracing::debug;

use super::{outgoing_or_empty, GraphRead};
use crate::primitives::concurrency::Deadline;
use crate::types::{GraphError, NodeId, Result};

/// Longest cycle length a filter may name.
pub const MAX_CYCLE_LENGTH: usize = 100;

/// Cycle detection parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleOptions {
    /// Shortest cycle to report; zero reports all.
    pub min_length: usize,
    /// Longest cycle to report; zero reports all.
    pub max_length: usize,
    /// Edge types to follow; empty follows every type.
    pub edge_types: Vec<String>,
}

impl CycleOptions {
    fn validate(&self) -> Result<()> {
        for (name, value) in [("min", self.min_length), ("max", self.max_length)] {
            if value > MAX_CYCLE_LENGTH {
                return Err(GraphError::invalid(format!(
                    "{name} cycle length must be at most {MAX_CYCLE_LENGTH}, got {value}"
                )));
            }
        }
        if self.min_length > 0 && self.max_length > 0 && self.min_length > self.max_length {
            return Err(GraphError::invalid("min cycle length exceeds max cycle length"));
        }
        Ok(())
    }

    fn accepts(&self, len: usize) -> bool {
        (self.min_length == 0 || len >= self.min_length)
            && (self.max_length == 0 || len <= self.max_length)
    }
}

/// A cycle, listed in edge order from the node where the walk entered it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cycle {
    /// Nodes on the cycle; the closing edge runs from the last back to the first.
    pub nodes: Vec<NodeId>,
}

impl Cycle {
    /// Number of edges on the cycle.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; a cycle has at least one node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether this is a single node pointing at itself.
    pub fn is_self_loop(&self) -> bool {
        self.nodes.len() == 1
    }
}

/// Summary over the reported cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleStats {
    /// Number of cycles.
    pub total_cycles: usize,
    /// Length of the shortest cycle, zero if none.
    pub shortest_cycle: usize,
    /// Length of the longest cycle, zero if none.
    pub longest_cycle: usize,
    /// Mean cycle length, zero if none.
    pub average_length: f64,
    /// Cycles of length one.
    pub self_loops: usize,
}

impl CycleStats {
    fn of(cycles: &[Cycle]) -> Self {
        if cycles.is_empty() {
            return Self::default();
        }
        let lengths = cycles.iter().map(Cycle::len);
        let total: usize = lengths.clone().sum();
        Self {
            total_cycles: cycles.len(),
            shortest_cycle: lengths.clone().min().unwrap_or(0),
            longest_cycle: lengths.max().unwrap_or(0),
            average_length: total as f64 / cycles.len() as f64,
            self_loops: cycles.iter().filter(|c| c.is_self_loop()).count(),
        }
    }
}

/// Cycles found plus their summary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    /// Cycles passing the length filter.
    pub cycles: Vec<Cycle>,
    /// Summary of `cycles`.
    pub stats: CycleStats,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

struct Frame {
    node: NodeId,
    targets: Vec<NodeId>,
    next: usize,
}

/// Three-color depth-first walk over every node. Each back edge closes one
/// cycle, which is handed to `found`; returning `true` stops the walk.
fn walk<G, F>(graph: &G, edge_types: &[String], deadline: &Deadline, mut found: F) -> Result<()>
where
    G: GraphRead + ?Sized,
    F: FnMut(&[NodeId]) -> bool,
{
    let targets_of = |id: NodeId| -> Result<Vec<NodeId>> {
        Ok(outgoing_or_empty(graph, id)?
            .into_iter()
            .filter(|e| edge_types.is_empty() || edge_types.iter().any(|t| *t == e.edge_type))
            .map(|e| e.to)
            .collect())
    };
    let mut color: FxHashMap<NodeId, Color> = FxHashMap::default();
    // Stack position of every gray node.
    let mut position: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut path: Vec<NodeId> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for root in graph.node_ids()? {
        if color.contains_key(&root) {
            continue;
        }
        color.insert(root, Color::Gray);
        position.insert(root, 0);
        path.push(root);
        stack.push(Frame {
            node: root,
            targets: targets_of(root)?,
            next: 0,
        });
        while let Some(frame) = stack.last_mut() {
            deadline.check()?;
            let Some(&target) = frame.targets.get(frame.next) else {
                let node = frame.node;
                stack.pop();
                path.pop();
                position.remove(&node);
                color.insert(node, Color::Black);
                continue;
            };
            frame.next += 1;
            match color.get(&target) {
                Some(Color::Gray) => {
                    let start = position.get(&target).copied().unwrap_or(0);
                    if found(&path[start..]) {
                        return Ok(());
                    }
                }
                Some(Color::Black) => {}
                None => {
                    if !graph.contains_node(target)? {
                        continue;
                    }
                    color.insert(target, Color::Gray);
                    position.insert(target, path.len());
                    path.push(target);
                    let targets = targets_of(target)?;
                    stack.push(Frame {
                        node: target,
                        targets,
                        next: 0,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Finds the cycles closed by back edges of a depth-first walk, visiting
/// roots in id order. A self-loop is a cycle of length one.
pub fn detect_cycles<G: GraphRead + ?Sized>(
    graph: &G,
    opts: &CycleOptions,
    deadline: &Deadline,
) -> Result<CycleReport> {
    opts.validate()?;
    deadline.check()?;
    let mut cycles = Vec::new();
    walk(graph, &opts.edge_types, deadline, |nodes| {
        if opts.accepts(nodes.len()) {
            cycles.push(Cycle {
                nodes: nodes.to_vec(),
            });
        }
        false
    })?;
    let stats = CycleStats::of(&cycles);
    debug!(
        cycles = stats.total_cycles,
        self_loops = stats.self_loops,
        "algorithms.detect_cycles"
    );
    Ok(CycleReport { cycles, stats })
}

/// Whether any cycle exists. Stops at the first one.
pub fn has_cycle<G: GraphRead + ?Sized>(graph: &G, deadline: &Deadline) -> Result<bool> {
    deadline.check()?;
    let mut any = false;
    walk(graph, &[], deadline, |_| {
        any = true;
        true
    })?;
    Ok(any)
}
