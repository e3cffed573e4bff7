use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::debug;

use super::{outgoing_or_empty, GraphRead};
use crate::primitives::concurrency::Deadline;
use crate::storage::{Edge, Node};
use crate::types::{GraphError, NodeId, Result};

/// Depth used when zero is requested.
pub const DEFAULT_TRAVERSAL_DEPTH: usize = 10;
/// Deepest traversal accepted.
pub const MAX_TRAVERSAL_DEPTH: usize = 100;

/// Visit order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Level by level.
    #[default]
    BreadthFirst,
    /// Follow each branch before its siblings.
    DepthFirst,
}

/// Traversal parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Hops from the start node; zero means [`DEFAULT_TRAVERSAL_DEPTH`].
    pub max_depth: usize,
    /// Visit order.
    pub order: TraversalOrder,
    /// Edge types to follow; empty follows every type.
    pub edge_types: Vec<String>,
}

impl TraversalOptions {
    /// Breadth-first up to `max_depth` hops.
    pub fn depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Sets the visit order.
    pub fn order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    /// Restricts the traversal to one more edge type.
    pub fn edge_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_types.push(edge_type.into());
        self
    }

    fn resolved_depth(&self) -> Result<usize> {
        match self.max_depth {
            0 => Ok(DEFAULT_TRAVERSAL_DEPTH),
            d if d > MAX_TRAVERSAL_DEPTH => Err(GraphError::invalid(format!(
                "max depth must be at most {MAX_TRAVERSAL_DEPTH}, got {d}"
            ))),
            d => Ok(d),
        }
    }

    fn follows(&self, edge: &Edge) -> bool {
        self.edge_types.is_empty() || self.edge_types.iter().any(|t| *t == edge.edge_type)
    }
}

/// A node reached by a traversal.
#[derive(Clone, Debug, PartialEq)]
pub struct Visit {
    /// The node.
    pub node: Node,
    /// Hops from the start node.
    pub depth: usize,
}

/// Walks outgoing edges from `start`, visiting each reachable node once.
///
/// Nodes deleted while the walk runs are skipped.
pub fn traverse<G: GraphRead + ?Sized>(
    graph: &G,
    start: NodeId,
    opts: &TraversalOptions,
    deadline: &Deadline,
) -> Result<Vec<Visit>> {
    let max_depth = opts.resolved_depth()?;
    deadline.check()?;
    let root = graph.node(start)?;
    let visits = match opts.order {
        TraversalOrder::BreadthFirst => breadth_first(graph, root, max_depth, opts, deadline)?,
        TraversalOrder::DepthFirst => depth_first(graph, root, max_depth, opts, deadline)?,
    };
    debug!(
        start = start.0,
        max_depth,
        order = ?opts.order,
        visited = visits.len(),
        "algorithms.traverse"
    );
    Ok(visits)
}

fn breadth_first<G: GraphRead + ?Sized>(
    graph: &G,
    root: Node,
    max_depth: usize,
    opts: &TraversalOptions,
    deadline: &Deadline,
) -> Result<Vec<Visit>> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
    seen.insert(root.id);
    queue.push_back((root.id, 0));
    let mut visits = vec![Visit {
        node: root,
        depth: 0,
    }];
    while let Some((id, depth)) = queue.pop_front() {
        deadline.check()?;
        if depth >= max_depth {
            continue;
        }
        for edge in outgoing_or_empty(graph, id)? {
            if !opts.follows(&edge) || !seen.insert(edge.to) {
                continue;
            }
            match graph.node(edge.to) {
                Ok(node) => {
                    visits.push(Visit {
                        node,
                        depth: depth + 1,
                    });
                    queue.push_back((edge.to, depth + 1));
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
    }
    Ok(visits)
}

fn depth_first<G: GraphRead + ?Sized>(
    graph: &G,
    root: Node,
    max_depth: usize,
    opts: &TraversalOptions,
    deadline: &Deadline,
) -> Result<Vec<Visit>> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack: Vec<(NodeId, usize)> = vec![(root.id, 0)];
    let mut visits = Vec::new();
    let mut root = Some(root);
    while let Some((id, depth)) = stack.pop() {
        deadline.check()?;
        if !seen.insert(id) {
            continue;
        }
        let node = match root.take() {
            Some(node) => node,
            None => match graph.node(id) {
                Ok(node) => node,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            },
        };
        visits.push(Visit { node, depth });
        if depth >= max_depth {
            continue;
        }
        let edges = outgoing_or_empty(graph, id)?;
        for edge in edges.iter().rev() {
            if opts.follows(edge) && !seen.contains(&edge.to) {
                stack.push((edge.to, depth + 1));
            }
        }
    }
    Ok(visits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::fixtures::{graph, ring};
    use crate::storage::EdgeSpec;
    use crate::types::ErrorKind;
    use std::time::Duration;

    fn ids(visits: &[Visit]) -> Vec<u64> {
        visits.iter().map(|v| v.node.id.0).collect()
    }

    #[test]
    fn bfs_visits_level_by_level() -> Result<()> {
        //   1 -> 2 -> 4
        //   1 -> 3 -> 5
        let g = graph(5, &[(1, 2), (1, 3), (2, 4), (3, 5)]);
        let visits = traverse(&g, NodeId(1), &TraversalOptions::default(), &Deadline::default())?;
        assert_eq!(ids(&visits), vec![1, 2, 3, 4, 5]);
        assert_eq!(visits[3].depth, 2);
        Ok(())
    }

    #[test]
    fn dfs_follows_branches_first() -> Result<()> {
        let g = graph(5, &[(1, 2), (1, 3), (2, 4), (3, 5)]);
        let opts = TraversalOptions::default().order(TraversalOrder::DepthFirst);
        let visits = traverse(&g, NodeId(1), &opts, &Deadline::default())?;
        assert_eq!(ids(&visits), vec![1, 2, 4, 3, 5]);
        Ok(())
    }

    #[test]
    fn depth_bound_and_cycles_terminate() -> Result<()> {
        let g = ring(6);
        let visits = traverse(&g, NodeId(1), &TraversalOptions::depth(2), &Deadline::default())?;
        assert_eq!(ids(&visits), vec![1, 2, 3]);
        let all = traverse(&g, NodeId(1), &TraversalOptions::default(), &Deadline::default())?;
        assert_eq!(all.len(), 6);
        Ok(())
    }

    #[test]
    fn depth_limits_are_validated() -> Result<()> {
        let g = ring(3);
        let err = traverse(&g, NodeId(1), &TraversalOptions::depth(101), &Deadline::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let deep = traverse(&g, NodeId(1), &TraversalOptions::depth(100), &Deadline::default());
        assert!(deep.is_ok());
        let err = traverse(&g, NodeId(9), &TraversalOptions::default(), &Deadline::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    }

    #[test]
    fn edge_type_filter_and_deleted_nodes() -> Result<()> {
        let g = graph(4, &[(1, 2), (2, 3)]);
        g.create_edge(EdgeSpec::new(NodeId(1), NodeId(4), "OTHER"))?;
        let opts = TraversalOptions::default().edge_type("OTHER");
        let visits = traverse(&g, NodeId(1), &opts, &Deadline::default())?;
        assert_eq!(ids(&visits), vec![1, 4]);
        g.delete_node(NodeId(2))?;
        let visits = traverse(&g, NodeId(1), &TraversalOptions::default(), &Deadline::default())?;
        assert_eq!(ids(&visits), vec![1, 4]);
        Ok(())
    }

    #[test]
    fn expired_deadline_is_timeout() {
        let g = ring(3);
        let err = traverse(
            &g,
            NodeId(1),
            &TraversalOptions::default(),
            &Deadline::after(Duration::ZERO),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
