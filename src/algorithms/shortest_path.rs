use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{outgoing_or_empty, GraphRead};
use crate::primitives::concurrency::Deadline;
use crate::types::{Entity, GraphError, NodeId, Result};

/// Outcome of an unweighted path search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathResult {
    /// Nodes from start to end inclusive; empty when no path exists.
    pub path: Vec<NodeId>,
    /// Whether a path exists.
    pub found: bool,
}

impl PathResult {
    fn not_found() -> Self {
        Self::default()
    }

    /// Number of edges on the path.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Outcome of a weighted path search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightedPath {
    /// Nodes from start to end inclusive; empty when no path exists.
    pub path: Vec<NodeId>,
    /// Sum of edge weights along `path`.
    pub distance: f64,
    /// Whether a path exists.
    pub found: bool,
}

fn require_endpoints<G: GraphRead + ?Sized>(graph: &G, start: NodeId, end: NodeId) -> Result<()> {
    for id in [start, end] {
        if !graph.contains_node(id)? {
            return Err(GraphError::NotFound(Entity::Node(id)));
        }
    }
    Ok(())
}

fn walk_back(parents: &FxHashMap<NodeId, NodeId>, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let mut path = vec![end];
    let mut cur = end;
    while cur != start {
        match parents.get(&cur) {
            Some(&prev) => {
                path.push(prev);
                cur = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Fewest-hops path from `start` to `end` along outgoing edges.
///
/// A missing endpoint is `NotFound`; an unreachable `end` is a result with
/// `found == false`.
pub fn shortest_path<G: GraphRead + ?Sized>(
    graph: &G,
    start: NodeId,
    end: NodeId,
    deadline: &Deadline,
) -> Result<PathResult> {
    deadline.check()?;
    require_endpoints(graph, start, end)?;
    if start == end {
        return Ok(PathResult {
            path: vec![start],
            found: true,
        });
    }
    let mut parents: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        deadline.check()?;
        for edge in outgoing_or_empty(graph, id)? {
            let next = edge.to;
            if next == start || parents.contains_key(&next) {
                continue;
            }
            parents.insert(next, id);
            if next == end {
                let path = walk_back(&parents, start, end);
                debug!(
                    start = start.0,
                    end = end.0,
                    hops = path.len() - 1,
                    "algorithms.shortest_path"
                );
                return Ok(PathResult { path, found: true });
            }
            queue.push_back(next);
        }
    }
    debug!(start = start.0, end = end.0, "algorithms.shortest_path.unreachable");
    Ok(PathResult::not_found())
}

/// Hop distance from `source` to every node it reaches, `source` itself at 0.
///
/// A missing `source` is `NotFound`.
pub fn all_shortest_paths<G: GraphRead + ?Sized>(
    graph: &G,
    source: NodeId,
    deadline: &Deadline,
) -> Result<BTreeMap<NodeId, usize>> {
    deadline.check()?;
    if !graph.contains_node(source)? {
        return Err(GraphError::NotFound(Entity::Node(source)));
    }
    let mut distances = BTreeMap::from([(source, 0usize)]);
    let mut queue = VecDeque::from([(source, 0usize)]);
    while let Some((id, hops)) = queue.pop_front() {
        deadline.check()?;
        for edge in outgoing_or_empty(graph, id)? {
            if distances.contains_key(&edge.to) || !graph.contains_node(edge.to)? {
                continue;
            }
            distances.insert(edge.to, hops + 1);
            queue.push_back((edge.to, hops + 1));
        }
    }
    debug!(source = source.0, reached = distances.len(), "algorithms.all_shortest_paths");
    Ok(distances)
}

#[derive(Clone, Copy, PartialEq)]
struct Frontier {
    distance: f64,
    node: NodeId,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the nearest node first.
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lowest-total-weight path from `start` to `end` (Dijkstra).
///
/// A negative weight on any edge the search reaches is `InvalidArgument`.
pub fn weighted_shortest_path<G: GraphRead + ?Sized>(
    graph: &G,
    start: NodeId,
    end: NodeId,
    deadline: &Deadline,
) -> Result<WeightedPath> {
    deadline.check()?;
    require_endpoints(graph, start, end)?;
    let mut dist: FxHashMap<NodeId, f64> = FxHashMap::default();
    let mut parents: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut heap = BinaryHeap::new();
    dist.insert(start, 0.0);
    heap.push(Frontier {
        distance: 0.0,
        node: start,
    });
    while let Some(Frontier { distance, node }) = heap.pop() {
        deadline.check()?;
        if node == end {
            let path = walk_back(&parents, start, end);
            debug!(
                start = start.0,
                end = end.0,
                distance,
                "algorithms.weighted_shortest_path"
            );
            return Ok(WeightedPath {
                path,
                distance,
                found: true,
            });
        }
        if dist.get(&node).is_some_and(|&best| distance > best) {
            continue;
        }
        for edge in outgoing_or_empty(graph, node)? {
            if edge.weight < 0.0 {
                return Err(GraphError::invalid(format!(
                    "edge {} has negative weight {}",
                    edge.id, edge.weight
                )));
            }
            let candidate = distance + edge.weight;
            let better = dist.get(&edge.to).map_or(true, |&best| candidate < best);
            if better {
                dist.insert(edge.to, candidate);
                parents.insert(edge.to, node);
                heap.push(Frontier {
                    distance: candidate,
                    node: edge.to,
                });
            }
        }
    }
    Ok(WeightedPath::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::fixtures::{graph, weighted_graph};
    use crate::types::ErrorKind;

    #[test]
    fn finds_fewest_hops() -> Result<()> {
        // 1 -> 2 -> 3 -> 4 and a shortcut 1 -> 5 -> 4
        let g = graph(5, &[(1, 2), (2, 3), (3, 4), (1, 5), (5, 4)]);
        let result = shortest_path(&g, NodeId(1), NodeId(4), &Deadline::default())?;
        assert!(result.found);
        assert_eq!(result.path, vec![NodeId(1), NodeId(5), NodeId(4)]);
        assert_eq!(result.hops(), 2);
        Ok(())
    }

    #[test]
    fn same_node_and_unreachable() -> Result<()> {
        let g = graph(3, &[(1, 2)]);
        let same = shortest_path(&g, NodeId(2), NodeId(2), &Deadline::default())?;
        assert_eq!(same.path, vec![NodeId(2)]);
        assert!(same.found);
        let none = shortest_path(&g, NodeId(2), NodeId(1), &Deadline::default())?;
        assert!(!none.found);
        assert!(none.path.is_empty());
        let err = shortest_path(&g, NodeId(1), NodeId(7), &Deadline::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    }

    #[test]
    fn dijkstra_prefers_light_paths() -> Result<()> {
        let g = weighted_graph(
            4,
            &[(1, 2, 1.0), (2, 4, 1.0), (1, 3, 0.5), (3, 4, 0.75), (1, 4, 5.0)],
        );
        let result = weighted_shortest_path(&g, NodeId(1), NodeId(4), &Deadline::default())?;
        assert!(result.found);
        assert_eq!(result.path, vec![NodeId(1), NodeId(3), NodeId(4)]);
        assert!((result.distance - 1.25).abs() < 1e-12);
        let none = weighted_shortest_path(&g, NodeId(4), NodeId(1), &Deadline::default())?;
        assert!(!none.found);
        Ok(())
    }

    #[test]
    fn negative_weights_are_rejected() {
        let g = weighted_graph(2, &[(1, 2, -1.0)]);
        let err =
            weighted_shortest_path(&g, NodeId(1), NodeId(2), &Deadline::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn hop_distances_from_a_source() -> Result<()> {
        // 1 -> 2 -> 3 -> 4, shortcut 1 -> 3, and 5 unreachable.
        let g = graph(5, &[(1, 2), (2, 3), (3, 4), (1, 3), (4, 1)]);
        let distances = all_shortest_paths(&g, NodeId(1), &Deadline::default())?;
        assert_eq!(
            distances.into_iter().collect::<Vec<_>>(),
            vec![(NodeId(1), 0), (NodeId(2), 1), (NodeId(3), 1), (NodeId(4), 2)]
        );
        let alone = all_shortest_paths(&g, NodeId(5), &Deadline::default())?;
        assert_eq!(alone.len(), 1);
        let err = all_shortest_paths(&g, NodeId(9), &Deadline::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    }
}
