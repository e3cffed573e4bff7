//! Hierarchical Navigable Small World graph (Malkov & Yashunin).
//!
//! Every element lives on layer 0 and, with exponentially decaying
//! probability, on the layers above it. Insertion descends greedily from the
//! top layer, then links the element to its nearest neighbors on each layer it
//! occupies. Search performs the same descent and a bounded best-first search
//! on layer 0.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::distance::VectorMetric;
use crate::primitives::concurrency::Deadline;
use crate::types::{GraphError, NodeId, Result};

/// Highest layer a new element may be assigned to.
const MAX_LEVEL: usize = 16;
/// Candidate expansions between deadline checks.
const DEADLINE_STRIDE: usize = 64;

type Links = SmallVec<[NodeId; 16]>;

/// Construction parameters of an [`HnswIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HnswParams {
    /// Vector length every element must have.
    pub dimensions: usize,
    /// Neighbors linked per element on layers above 0.
    pub m: usize,
    /// Candidate list size while inserting.
    pub ef_construction: usize,
    /// Distance metric.
    pub metric: VectorMetric,
}

/// `(distance, id)` ordered by distance then id, so heaps are deterministic.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    distance: f32,
    id: NodeId,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

struct Element {
    vector: Vec<f32>,
    /// Neighbor lists, one per layer `0..=level`.
    links: Vec<Links>,
}

impl Element {
    fn level(&self) -> usize {
        self.links.len() - 1
    }
}

/// In-memory HNSW index keyed by node id.
///
/// Not internally synchronized; the registry wraps each index in a
/// reader/writer lock.
pub struct HnswIndex {
    params: HnswParams,
    m_max0: usize,
    level_mult: f64,
    rng: ChaCha8Rng,
    elements: FxHashMap<NodeId, Element>,
    entry_point: Option<NodeId>,
}

impl HnswIndex {
    /// Creates an empty index. Level assignment draws from a generator seeded
    /// with `seed`, so equal insert sequences build equal graphs.
    pub fn new(params: HnswParams, seed: u64) -> Self {
        let m = params.m.max(2);
        Self {
            params: HnswParams { m, ..params },
            m_max0: m * 2,
            level_mult: 1.0 / (m as f64).ln(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            elements: FxHashMap::default(),
            entry_point: None,
        }
    }

    /// Construction parameters.
    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Number of indexed elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the index holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether `id` is indexed.
    pub fn contains(&self, id: NodeId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Stored vector of `id`.
    pub fn vector(&self, id: NodeId) -> Option<&[f32]> {
        self.elements.get(&id).map(|el| el.vector.as_slice())
    }

    /// Words drawn so far from the level generator.
    #[cfg(test)]
    pub(crate) fn level_draws(&self) -> u128 {
        self.rng.get_word_pos()
    }

    fn random_level(&mut self) -> usize {
        // gen() is in [0, 1); flip it so ln never sees zero.
        let uniform = 1.0 - self.rng.gen::<f64>();
        let level = (-uniform.ln() * self.level_mult).floor();
        (level as usize).min(MAX_LEVEL)
    }

    fn distance_to(&self, query: &[f32], id: NodeId) -> Option<f32> {
        self.elements
            .get(&id)
            .map(|el| self.params.metric.distance(query, &el.vector))
    }

    fn top_level(&self) -> usize {
        self.entry_point
            .and_then(|ep| self.elements.get(&ep))
            .map_or(0, Element::level)
    }

    /// Inserts or replaces the vector of `id`.
    pub fn insert(&mut self, id: NodeId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.params.dimensions {
            return Err(GraphError::invalid(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.params.dimensions
            )));
        }
        if self.elements.contains_key(&id) {
            self.remove(id);
        }
        let level = self.random_level();
        let Some(entry) = self.entry_point else {
            self.elements.insert(
                id,
                Element {
                    vector: vector.to_vec(),
                    links: vec![Links::new(); level + 1],
                },
            );
            self.entry_point = Some(id);
            return Ok(());
        };
        let top = self.top_level();
        let mut nearest = self.greedy_descent(vector, entry, top, level)?;

        let mut links = vec![Links::new(); level + 1];
        for layer in (0..=level.min(top)).rev() {
            let found =
                self.search_layer(vector, &nearest, self.params.ef_construction, layer, None)?;
            let selected: Links = found.iter().take(self.params.m).map(|c| c.id).collect();
            links[layer] = selected;
            nearest = found;
        }
        let back_links = links.clone();
        self.elements.insert(
            id,
            Element {
                vector: vector.to_vec(),
                links,
            },
        );
        for (layer, neighbors) in back_links.into_iter().enumerate() {
            for neighbor in neighbors {
                self.link(neighbor, id, layer);
            }
        }
        if level > top {
            self.entry_point = Some(id);
        }
        Ok(())
    }

    /// Adds `to` to the layer list of `from`, pruning to the layer cap.
    fn link(&mut self, from: NodeId, to: NodeId, layer: usize) {
        let cap = if layer == 0 { self.m_max0 } else { self.params.m };
        let metric = self.params.metric;
        let Some(element) = self.elements.get(&from) else {
            return;
        };
        if layer > element.level() || element.links[layer].contains(&to) {
            return;
        }
        let mut list: Vec<NodeId> = element.links[layer].iter().copied().collect();
        list.push(to);
        if list.len() > cap {
            let base = element.vector.clone();
            let mut scored: Vec<Candidate> = list
                .iter()
                .filter_map(|&n| {
                    self.elements.get(&n).map(|el| Candidate {
                        distance: metric.distance(&base, &el.vector),
                        id: n,
                    })
                })
                .collect();
            scored.sort();
            list = scored.into_iter().take(cap).map(|c| c.id).collect();
        }
        if let Some(element) = self.elements.get_mut(&from) {
            element.links[layer] = list.into_iter().collect();
        }
    }

    /// Removes `id` and every link pointing at it. Returns whether it was present.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.elements.remove(&id).is_none() {
            return false;
        }
        for element in self.elements.values_mut() {
            for links in element.links.iter_mut() {
                links.retain(|n| *n != id);
            }
        }
        if self.entry_point == Some(id) {
            self.entry_point = self
                .elements
                .iter()
                .max_by(|(a_id, a), (b_id, b)| a.level().cmp(&b.level()).then(b_id.cmp(a_id)))
                .map(|(id, _)| *id);
        }
        true
    }

    /// Descends from `top` to `stop + 1` with a one-element beam.
    fn greedy_descent(
        &self,
        query: &[f32],
        entry: NodeId,
        top: usize,
        stop: usize,
    ) -> Result<Vec<Candidate>> {
        let distance = self.distance_to(query, entry).unwrap_or(f32::INFINITY);
        let mut nearest = vec![Candidate { distance, id: entry }];
        let mut layer = top;
        while layer > stop {
            nearest = self.search_layer(query, &nearest, 1, layer, None)?;
            layer -= 1;
        }
        Ok(nearest)
    }

    /// Best-first search on one layer. Returns up to `ef` candidates sorted
    /// nearest first.
    fn search_layer(
        &self,
        query: &[f32],
        entry: &[Candidate],
        ef: usize,
        layer: usize,
        deadline: Option<&Deadline>,
    ) -> Result<Vec<Candidate>> {
        let ef = ef.max(1);
        let mut visited: FxHashSet<NodeId> = entry.iter().map(|c| c.id).collect();
        let mut frontier: BinaryHeap<Reverse<Candidate>> =
            entry.iter().copied().map(Reverse).collect();
        let mut best: BinaryHeap<Candidate> = entry.iter().copied().collect();
        while best.len() > ef {
            best.pop();
        }
        let mut expanded = 0usize;
        while let Some(Reverse(current)) = frontier.pop() {
            if let Some(worst) = best.peek() {
                if current.distance > worst.distance && best.len() >= ef {
                    break;
                }
            }
            expanded += 1;
            if expanded % DEADLINE_STRIDE == 0 {
                if let Some(deadline) = deadline {
                    deadline.check()?;
                }
            }
            let Some(element) = self.elements.get(&current.id) else {
                continue;
            };
            let Some(links) = element.links.get(layer) else {
                continue;
            };
            for &neighbor in links {
                if !visited.insert(neighbor) {
                    continue;
                }
                let Some(distance) = self.distance_to(query, neighbor) else {
                    continue;
                };
                let candidate = Candidate { distance, id: neighbor };
                let admit = best.len() < ef || best.peek().is_some_and(|w| candidate < *w);
                if admit {
                    frontier.push(Reverse(candidate));
                    best.push(candidate);
                    if best.len() > ef {
                        best.pop();
                    }
                }
            }
        }
        Ok(best.into_sorted_vec())
    }

    /// Returns up to `k` `(id, distance)` pairs nearest first, exploring with a
    /// candidate list of `max(ef, k)`.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        deadline: &Deadline,
    ) -> Result<Vec<(NodeId, f32)>> {
        if query.len() != self.params.dimensions {
            return Err(GraphError::invalid(format!(
                "query has {} dimensions, index expects {}",
                query.len(),
                self.params.dimensions
            )));
        }
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        let nearest = self.greedy_descent(query, entry, self.top_level(), 0)?;
        deadline.check()?;
        let found = self.search_layer(query, &nearest, ef.max(k), 0, Some(deadline))?;
        Ok(found.into_iter().take(k).map(|c| (c.id, c.distance)).collect())
    }
}
