use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashSet;
use tracing::debug;

use super::{Adjacency, GraphRead};
use crate::primitives::concurrency::Deadline;
use crate::types::{NodeId, Result};

/// Weakly connected components, edges treated as undirected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Components {
    /// Members of each component in discovery order. Components are numbered
    /// by their smallest node id.
    pub components: Vec<Vec<NodeId>>,
    /// Component index of every node.
    pub membership: BTreeMap<NodeId, usize>,
}

impl Components {
    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the graph had no nodes.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Size of the largest component.
    pub fn largest(&self) -> usize {
        self.components.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Splits the graph into weakly connected components with a breadth-first
/// sweep from each unvisited node in id order.
pub fn connected_components<G: GraphRead + ?Sized>(
    graph: &G,
    deadline: &Deadline,
) -> Result<Components> {
    let adjacency = Adjacency::load(graph, deadline)?;
    let neighbors = adjacency.undirected();
    let mut result = Components::default();
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut queue = VecDeque::new();
    for &start in &adjacency.ids {
        if !seen.insert(start) {
            continue;
        }
        deadline.check()?;
        let index = result.components.len();
        let mut members = Vec::new();
        queue.push_back(start);
        while let Some(id) = queue.pop_front() {
            members.push(id);
            result.membership.insert(id, index);
            for &next in neighbors.get(&id).map_or(&[][..], Vec::as_slice) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        result.components.push(members);
    }
    debug!(
        nodes = adjacency.ids.len(),
        components = result.len(),
        "algorithms.connected_components"
    );
    Ok(result)
}

/// Whether every node is reachable from every other with edges treated as
/// undirected. An empty graph is connected.
pub fn is_connected<G: GraphRead + ?Sized>(graph: &G, deadline: &Deadline) -> Result<bool> {
    Ok(connected_components(graph, deadline)?.len() <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::fixtures::graph;

    #[test]
    fn components_ignore_direction() -> Result<()> {
        // {1, 2, 3} joined against edge direction, {4, 5}, and {6} alone.
        let g = graph(6, &[(1, 2), (3, 2), (5, 4)]);
        let found = connected_components(&g, &Deadline::default())?;
        assert_eq!(found.len(), 3);
        assert_eq!(found.components[0], vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert_eq!(found.components[1], vec![NodeId(4), NodeId(5)]);
        assert_eq!(found.components[2], vec![NodeId(6)]);
        assert_eq!(found.membership[&NodeId(5)], 1);
        assert_eq!(found.largest(), 3);
        assert!(!is_connected(&g, &Deadline::default())?);
        Ok(())
    }

    #[test]
    fn connectivity_edge_cases() -> Result<()> {
        assert!(is_connected(&graph(0, &[]), &Deadline::default())?);
        assert!(is_connected(&graph(1, &[]), &Deadline::default())?);
        assert!(is_connected(&graph(3, &[(3, 1), (2, 3)]), &Deadline::default())?);
        Ok(())
    }
}
