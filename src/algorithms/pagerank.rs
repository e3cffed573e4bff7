use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::{outgoing_or_empty, GraphRead};
use crate::primitives::concurrency::Deadline;
use crate::types::{GraphError, NodeId, Result};

/// Iterations run when none are requested.
pub const DEFAULT_PAGERANK_ITERATIONS: usize = 20;
/// Most iterations accepted.
pub const MAX_PAGERANK_ITERATIONS: usize = 1000;
/// Damping used when none is requested.
pub const DEFAULT_DAMPING_FACTOR: f64 = 0.85;
/// Largest per-node change at which the iteration stops early.
pub const PAGERANK_TOLERANCE: f64 = 1e-6;

/// PageRank parameters; `None` takes the default.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PageRankOptions {
    /// Iteration cap in `[1, 1000]`.
    pub iterations: Option<usize>,
    /// Damping factor in `[0, 1]`.
    pub damping: Option<f64>,
}

impl PageRankOptions {
    fn resolve(&self) -> Result<(usize, f64)> {
        let iterations = self.iterations.unwrap_or(DEFAULT_PAGERANK_ITERATIONS);
        if !(1..=MAX_PAGERANK_ITERATIONS).contains(&iterations) {
            return Err(GraphError::invalid(format!(
                "iterations must be in [1, {MAX_PAGERANK_ITERATIONS}], got {iterations}"
            )));
        }
        let damping = self.damping.unwrap_or(DEFAULT_DAMPING_FACTOR);
        if !(0.0..=1.0).contains(&damping) {
            return Err(GraphError::invalid(format!(
                "damping factor must be in [0, 1], got {damping}"
            )));
        }
        Ok((iterations, damping))
    }
}

/// PageRank scores, summing to one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageRankResult {
    /// Score per live node.
    pub scores: BTreeMap<NodeId, f64>,
    /// Iterations run.
    pub iterations: usize,
    /// Whether the scores settled within tolerance before the cap.
    pub converged: bool,
}

impl PageRankResult {
    /// Score of one node.
    pub fn score(&self, id: NodeId) -> Option<f64> {
        self.scores.get(&id).copied()
    }

    /// The `n` highest-ranked nodes, best first; ties go to the lower id.
    pub fn top(&self, n: usize) -> Vec<(NodeId, f64)> {
        let mut ranked: Vec<(NodeId, f64)> = self.scores.iter().map(|(&id, &s)| (id, s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Power-iteration PageRank over outgoing edges.
///
/// Rank held by nodes without outgoing edges is spread evenly over every
/// node. Edges into deleted nodes are ignored.
pub fn pagerank<G: GraphRead + ?Sized>(
    graph: &G,
    opts: &PageRankOptions,
    deadline: &Deadline,
) -> Result<PageRankResult> {
    let (max_iterations, damping) = opts.resolve()?;
    deadline.check()?;
    let ids = graph.node_ids()?;
    let n = ids.len();
    if n == 0 {
        return Ok(PageRankResult {
            converged: true,
            ..PageRankResult::default()
        });
    }
    let index: FxHashMap<NodeId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let mut out: Vec<Vec<usize>> = Vec::with_capacity(n);
    for &id in &ids {
        deadline.check()?;
        let targets = outgoing_or_empty(graph, id)?
            .into_iter()
            .filter_map(|e| index.get(&e.to).copied())
            .collect();
        out.push(targets);
    }

    let size = n as f64;
    let mut scores = vec![1.0 / size; n];
    let mut next = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iterations {
        deadline.check()?;
        iterations += 1;
        let dangling: f64 = out
            .iter()
            .zip(&scores)
            .filter(|(targets, _)| targets.is_empty())
            .map(|(_, s)| s)
            .sum();
        let base = (1.0 - damping) / size + damping * dangling / size;
        next.fill(base);
        for (u, targets) in out.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = damping * scores[u] / targets.len() as f64;
            for &v in targets {
                next[v] += share;
            }
        }
        let delta = scores
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        std::mem::swap(&mut scores, &mut next);
        if delta < PAGERANK_TOLERANCE {
            converged = true;
            break;
        }
    }

    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in &mut scores {
            *s /= total;
        }
    }
    if converged {
        info!(iterations, nodes = n, "algorithms.pagerank.converged");
    } else {
        debug!(iterations, nodes = n, "algorithms.pagerank.capped");
    }
    Ok(PageRankResult {
        scores: ids.into_iter().zip(scores).collect(),
        iterations,
        converged,
    })
}
