use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{outgoing_or_empty, Adjacency, GraphRead};
use crate::primitives::concurrency::Deadline;
use crate::types::{EdgeId, NodeId, Result};

struct Brandes {
    ids: Vec<NodeId>,
    nodes: Vec<f64>,
    edges: BTreeMap<EdgeId, f64>,
}

/// One pass of Brandes' accumulation, yielding raw node and edge scores.
fn brandes<G: GraphRead + ?Sized>(graph: &G, deadline: &Deadline) -> Result<Brandes> {
    deadline.check()?;
    let ids = graph.node_ids()?;
    let n = ids.len();
    let index: FxHashMap<NodeId, usize> =
        ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let mut adjacency: Vec<Vec<(usize, EdgeId)>> = Vec::with_capacity(n);
    for &id in &ids {
        deadline.check()?;
        adjacency.push(
            outgoing_or_empty(graph, id)?
                .into_iter()
                .filter_map(|e| index.get(&e.to).map(|&to| (to, e.id)))
                .collect(),
        );
    }

    let mut node_scores = vec![0.0; n];
    let mut edge_scores: BTreeMap<EdgeId, f64> = BTreeMap::new();
    let mut order: Vec<usize> = Vec::with_capacity(n);
    let mut preds: Vec<Vec<(usize, EdgeId)>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![-1i64; n];
    let mut delta = vec![0.0f64; n];
    let mut queue = VecDeque::new();

    for source in 0..n {
        deadline.check()?;
        order.clear();
        preds.iter_mut().for_each(Vec::clear);
        sigma.fill(0.0);
        dist.fill(-1);
        delta.fill(0.0);
        sigma[source] = 1.0;
        dist[source] = 0;
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &(w, edge) in &adjacency[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push((v, edge));
                }
            }
        }
        for &w in order.iter().rev() {
            for &(v, edge) in &preds[w] {
                let share = sigma[v] / sigma[w] * (1.0 + delta[w]);
                delta[v] += share;
                *edge_scores.entry(edge).or_insert(0.0) += share;
            }
            if w != source {
                node_scores[w] += delta[w];
            }
        }
    }
    Ok(Brandes {
        ids,
        nodes: node_scores,
        edges: edge_scores,
    })
}

/// Betweenness centrality of every node, normalized by `(n-1)(n-2)` when
/// the graph has more than two nodes.
pub fn betweenness_centrality<G: GraphRead + ?Sized>(
    graph: &G,
    deadline: &Deadline,
) -> Result<BTreeMap<NodeId, f64>> {
    let raw = brandes(graph, deadline)?;
    let n = raw.ids.len();
    let norm = if n > 2 {
        1.0 / ((n - 1) * (n - 2)) as f64
    } else {
        1.0
    };
    debug!(nodes = n, "algorithms.betweenness");
    Ok(raw
        .ids
        .into_iter()
        .zip(raw.nodes)
        .map(|(id, score)| (id, score * norm))
        .collect())
}

/// Betweenness centrality of every edge on at least one shortest path,
/// normalized by `n(n-1)` when the graph has more than one node.
pub fn edge_betweenness_centrality<G: GraphRead + ?Sized>(
    graph: &G,
    deadline: &Deadline,
) -> Result<BTreeMap<EdgeId, f64>> {
    let raw = brandes(graph, deadline)?;
    let n = raw.ids.len();
    let norm = if n > 1 {
        1.0 / (n * (n - 1)) as f64
    } else {
        1.0
    };
    debug!(nodes = n, edges = raw.edges.len(), "algorithms.edge_betweenness");
    Ok(raw
        .edges
        .into_iter()
        .map(|(id, score)| (id, score * norm))
        .collect())
}

/// In-degree plus out-degree of every node, divided by `n - 1`. A self-loop
/// counts once in each direction. Every score is 0 when the graph has fewer
/// than two nodes.
pub fn degree_centrality<G: GraphRead + ?Sized>(
    graph: &G,
    deadline: &Deadline,
) -> Result<BTreeMap<NodeId, f64>> {
    let adjacency = Adjacency::load(graph, deadline)?;
    let n = adjacency.ids.len();
    let mut degree: FxHashMap<NodeId, usize> = FxHashMap::default();
    for &id in &adjacency.ids {
        let targets = adjacency.targets(id);
        *degree.entry(id).or_insert(0) += targets.len();
        for &to in targets {
            *degree.entry(to).or_insert(0) += 1;
        }
    }
    debug!(nodes = n, "algorithms.degree_centrality");
    Ok(adjacency
        .ids
        .iter()
        .map(|id| {
            let score = if n > 1 {
                degree.get(id).copied().unwrap_or(0) as f64 / (n - 1) as f64
            } else {
                0.0
            };
            (*id, score)
        })
        .collect())
}

/// Closeness of every node along outgoing edges: the number of nodes it
/// reaches divided by the sum of hop distances to them. A node that reaches
/// nothing scores 0.
pub fn closeness_centrality<G: GraphRead + ?Sized>(
    graph: &G,
    deadline: &Deadline,
) -> Result<BTreeMap<NodeId, f64>> {
    let adjacency = Adjacency::load(graph, deadline)?;
    let mut scores = BTreeMap::new();
    let mut dist: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut queue = VecDeque::new();
    for &source in &adjacency.ids {
        deadline.check()?;
        dist.clear();
        dist.insert(source, 0);
        queue.push_back(source);
        let (mut reached, mut total) = (0usize, 0usize);
        while let Some(v) = queue.pop_front() {
            let next = dist[&v] + 1;
            for &w in adjacency.targets(v) {
                if dist.contains_key(&w) {
                    continue;
                }
                dist.insert(w, next);
                reached += 1;
                total += next;
                queue.push_back(w);
            }
        }
        let score = if total > 0 {
            reached as f64 / total as f64
        } else {
            0.0
        };
        scores.insert(source, score);
    }
    debug!(nodes = adjacency.ids.len(), "algorithms.closeness_centrality");
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::fixtures::{graph, ring};
    use crate::types::ErrorKind;
    use std::time::Duration;

    #[test]
    fn middle_of_a_chain_scores_highest() -> Result<()> {
        // 1 -> 2 -> 3: only 2 lies between a pair (1, 3).
        let g = graph(3, &[(1, 2), (2, 3)]);
        let scores = betweenness_centrality(&g, &Deadline::default())?;
        assert_eq!(scores[&NodeId(1)], 0.0);
        assert!((scores[&NodeId(2)] - 0.5).abs() < 1e-12);
        assert_eq!(scores[&NodeId(3)], 0.0);
        Ok(())
    }

    #[test]
    fn ring_is_symmetric() -> Result<()> {
        let g = ring(5);
        let scores = betweenness_centrality(&g, &Deadline::default())?;
        let first = scores[&NodeId(1)];
        assert!(first > 0.0);
        for score in scores.values() {
            assert!((score - first).abs() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn split_paths_share_credit() -> Result<()> {
        // Two equal routes 1 -> {2,3} -> 4.
        let g = graph(4, &[(1, 2), (1, 3), (2, 4), (3, 4)]);
        let scores = betweenness_centrality(&g, &Deadline::default())?;
        assert!((scores[&NodeId(2)] - scores[&NodeId(3)]).abs() < 1e-12);
        assert!((scores[&NodeId(2)] - 0.5 / 6.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn bridge_edge_carries_most_paths() -> Result<()> {
        let g = graph(3, &[(1, 2), (2, 3)]);
        let scores = edge_betweenness_centrality(&g, &Deadline::default())?;
        // Edge 1 (1->2) lies on 1->2 and 1->3; edge 2 (2->3) on 2->3 and 1->3.
        assert!((scores[&EdgeId(1)] - 2.0 / 6.0).abs() < 1e-12);
        assert!((scores[&EdgeId(2)] - 2.0 / 6.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn degree_counts_both_directions() -> Result<()> {
        // Star: 1 -> 2, 1 -> 3, 4 -> 1, plus a self-loop on 4.
        let g = graph(4, &[(1, 2), (1, 3), (4, 1), (4, 4)]);
        let scores = degree_centrality(&g, &Deadline::default())?;
        assert!((scores[&NodeId(1)] - 1.0).abs() < 1e-12);
        assert!((scores[&NodeId(2)] - 1.0 / 3.0).abs() < 1e-12);
        assert!((scores[&NodeId(4)] - 1.0).abs() < 1e-12);
        let single = graph(1, &[]);
        assert_eq!(degree_centrality(&single, &Deadline::default())?[&NodeId(1)], 0.0);
        Ok(())
    }

    #[test]
    fn closeness_follows_outgoing_distances() -> Result<()> {
        // 1 -> 2 -> 3: node 1 reaches 2 nodes at total distance 3.
        let g = graph(3, &[(1, 2), (2, 3)]);
        let scores = closeness_centrality(&g, &Deadline::default())?;
        assert!((scores[&NodeId(1)] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(scores[&NodeId(2)], 1.0);
        assert_eq!(scores[&NodeId(3)], 0.0);
        let ring_scores = closeness_centrality(&ring(4), &Deadline::default())?;
        assert!(ring_scores.values().all(|s| (s - 0.5).abs() < 1e-12));
        Ok(())
    }

    #[test]
    fn honours_the_deadline() {
        let g = ring(4);
        let err = betweenness_centrality(&g, &Deadline::after(Duration::ZERO)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
