use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{Adjacency, GraphRead};
use crate::primitives::concurrency::Deadline;
use crate::types::{GraphError, NodeId, Result};

/// Orders every node so each edge points forward (Kahn's algorithm). Among
/// nodes that are ready at the same time the smaller id comes first.
///
/// A graph with a cycle, self-loops included, is `Conflict`.
pub fn topological_sort<G: GraphRead + ?Sized>(
    graph: &G,
    deadline: &Deadline,
) -> Result<Vec<NodeId>> {
    let adjacency = Adjacency::load(graph, deadline)?;
    match kahn(&adjacency, deadline)? {
        Some(order) => {
            debug!(nodes = order.len(), "algorithms.topological_sort");
            Ok(order)
        }
        None => Err(GraphError::Conflict(
            "graph contains a cycle; no topological order exists".into(),
        )),
    }
}

/// Whether the graph has no directed cycle.
pub fn is_dag<G: GraphRead + ?Sized>(graph: &G, deadline: &Deadline) -> Result<bool> {
    let adjacency = Adjacency::load(graph, deadline)?;
    Ok(kahn(&adjacency, deadline)?.is_some())
}

fn kahn(adjacency: &Adjacency, deadline: &Deadline) -> Result<Option<Vec<NodeId>>> {
    let mut in_degree: FxHashMap<NodeId, usize> =
        adjacency.ids.iter().map(|&id| (id, 0)).collect();
    for &id in &adjacency.ids {
        for to in adjacency.targets(id) {
            if let Some(d) = in_degree.get_mut(to) {
                *d += 1;
            }
        }
    }
    let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(&id, _)| Reverse(id))
        .collect();
    let mut order = Vec::with_capacity(adjacency.ids.len());
    while let Some(Reverse(id)) = ready.pop() {
        deadline.check()?;
        order.push(id);
        for to in adjacency.targets(id) {
            if let Some(d) = in_degree.get_mut(to) {
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(*to));
                }
            }
        }
    }
    Ok((order.len() == adjacency.ids.len()).then_some(order))
}

/// Two-colors the graph with edges treated as undirected. Returns the two
/// sides, each ascending, or `None` if some edge joins nodes of the same
/// color (an odd cycle or a self-loop).
pub fn bipartition<G: GraphRead + ?Sized>(
    graph: &G,
    deadline: &Deadline,
) -> Result<Option<(Vec<NodeId>, Vec<NodeId>)>> {
    let adjacency = Adjacency::load(graph, deadline)?;
    let neighbors = adjacency.undirected();
    let mut color: FxHashMap<NodeId, bool> = FxHashMap::default();
    let mut queue = VecDeque::new();
    for &start in &adjacency.ids {
        if color.contains_key(&start) {
            continue;
        }
        deadline.check()?;
        color.insert(start, false);
        queue.push_back(start);
        while let Some(id) = queue.pop_front() {
            let side = color[&id];
            for &next in neighbors.get(&id).map_or(&[][..], Vec::as_slice) {
                match color.get(&next) {
                    Some(&other) if other == side => {
                        debug!(node = id.0, neighbor = next.0, "algorithms.bipartition.conflict");
                        return Ok(None);
                    }
                    Some(_) => {}
                    None => {
                        color.insert(next, !side);
                        queue.push_back(next);
                    }
                }
            }
        }
    }
    let (left, right): (Vec<NodeId>, Vec<NodeId>) =
        adjacency.ids.iter().copied().partition(|id| !color[id]);
    Ok(Some((left, right)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::fixtures::{graph, ring};
    use crate::types::ErrorKind;

    #[test]
    fn sort_puts_every_edge_forward() -> Result<()> {
        let edges = [(5, 1), (5, 3), (1, 2), (3, 2), (2, 4)];
        let g = graph(5, &edges);
        let order = topological_sort(&g, &Deadline::default())?;
        assert_eq!(order, vec![NodeId(5), NodeId(1), NodeId(3), NodeId(2), NodeId(4)]);
        let pos = |id: u64| order.iter().position(|n| *n == NodeId(id));
        for (from, to) in edges {
            assert!(pos(from) < pos(to));
        }
        assert!(is_dag(&g, &Deadline::default())?);
        Ok(())
    }

    #[test]
    fn cycles_have_no_order() -> Result<()> {
        let err = topological_sort(&ring(3), &Deadline::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!is_dag(&ring(3), &Deadline::default())?);
        assert!(!is_dag(&graph(2, &[(1, 2), (2, 2)]), &Deadline::default())?);
        assert!(topological_sort(&graph(0, &[]), &Deadline::default())?.is_empty());
        Ok(())
    }

    #[test]
    fn bipartition_of_even_and_odd_rings() -> Result<()> {
        let (left, right) = bipartition(&ring(4), &Deadline::default())?.unwrap();
        assert_eq!(left, vec![NodeId(1), NodeId(3)]);
        assert_eq!(right, vec![NodeId(2), NodeId(4)]);
        assert!(bipartition(&ring(3), &Deadline::default())?.is_none());
        assert!(bipartition(&graph(1, &[(1, 1)]), &Deadline::default())?.is_none());
        Ok(())
    }
}
