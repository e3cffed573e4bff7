use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::distance::VectorMetric;
use super::hnsw::{HnswIndex, HnswParams};
use crate::primitives::concurrency::Deadline;
use crate::types::{check_vector, Entity, GraphError, NodeId, Properties, Result, Value};

/// Smallest accepted vector dimension.
pub const MIN_DIMENSIONS: usize = 1;
/// Largest accepted vector dimension.
pub const MAX_DIMENSIONS: usize = 4096;
/// Fan-out used when `m` is zero.
pub const DEFAULT_M: usize = 16;
/// Build beam used when `ef_construction` is zero.
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;
/// Largest `k` a search may ask for.
pub const MAX_K: usize = 1000;
/// Floor of the default search beam.
pub const MIN_DEFAULT_EF: usize = 50;

/// Durable definition of a vector index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Node property holding the vectors.
    pub property: String,
    /// Vector length.
    pub dimensions: usize,
    /// HNSW fan-out.
    pub m: usize,
    /// HNSW build beam.
    pub ef_construction: usize,
    /// Distance metric.
    pub metric: VectorMetric,
}

impl VectorIndexConfig {
    /// Validates parameters; zero `m` or `ef_construction` take the defaults.
    pub fn new(
        property: impl Into<String>,
        dimensions: usize,
        m: usize,
        ef_construction: usize,
        metric: VectorMetric,
    ) -> Result<Self> {
        let property = property.into();
        if property.is_empty() {
            return Err(GraphError::invalid("vector index property must not be empty"));
        }
        if !(MIN_DIMENSIONS..=MAX_DIMENSIONS).contains(&dimensions) {
            return Err(GraphError::invalid(format!(
                "dimensions must be in [{MIN_DIMENSIONS}, {MAX_DIMENSIONS}], got {dimensions}"
            )));
        }
        Ok(Self {
            property,
            dimensions,
            m: if m == 0 { DEFAULT_M } else { m },
            ef_construction: if ef_construction == 0 {
                DEFAULT_EF_CONSTRUCTION
            } else {
                ef_construction
            },
            metric,
        })
    }

    fn params(&self) -> HnswParams {
        HnswParams {
            dimensions: self.dimensions,
            m: self.m,
            ef_construction: self.ef_construction,
            metric: self.metric,
        }
    }
}

/// Metadata of a live index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorIndexInfo {
    /// Index definition.
    pub config: VectorIndexConfig,
    /// Number of indexed nodes.
    pub len: usize,
}

impl VectorIndexInfo {
    /// Indexed property name.
    pub fn property(&self) -> &str {
        &self.config.property
    }

    /// Vector length.
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Distance metric.
    pub fn metric(&self) -> VectorMetric {
        self.config.metric
    }
}

/// One search result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VectorHit {
    /// Matching node.
    pub node_id: NodeId,
    /// Raw distance under the index metric.
    pub distance: f32,
    /// Similarity derived from `distance`; higher is closer.
    pub score: f32,
}

struct IndexSlot {
    config: VectorIndexConfig,
    index: RwLock<HnswIndex>,
}

/// Property name to HNSW index map.
///
/// Lock order is registry map, then a single index. Searches hold read locks
/// only; node writes take the index write lock.
pub struct VectorRegistry {
    seed: u64,
    indexes: RwLock<FxHashMap<String, Arc<IndexSlot>>>,
}

impl VectorRegistry {
    /// Creates an empty registry; every index seeds its level generator from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            indexes: RwLock::new(FxHashMap::default()),
        }
    }

    /// `Conflict` if `property` is already indexed.
    pub fn ensure_absent(&self, property: &str) -> Result<()> {
        if self.indexes.read().contains_key(property) {
            return Err(GraphError::Conflict(format!(
                "vector index on '{property}' already exists"
            )));
        }
        Ok(())
    }

    /// Creates an index and fills it from `nodes`. Nodes without a vector of
    /// the right length under the property are skipped.
    pub fn create<'a>(
        &self,
        config: VectorIndexConfig,
        nodes: impl IntoIterator<Item = (NodeId, &'a Properties)>,
    ) -> Result<()> {
        let mut indexes = self.indexes.write();
        if indexes.contains_key(&config.property) {
            return Err(GraphError::Conflict(format!(
                "vector index on '{}' already exists",
                config.property
            )));
        }
        let mut index = HnswIndex::new(config.params(), self.seed);
        let mut skipped = 0usize;
        for (id, props) in nodes {
            if let Some(Value::Vector(v)) = props.get(&config.property) {
                if v.len() == config.dimensions {
                    index.insert(id, v)?;
                } else {
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!(
                property = %config.property,
                skipped,
                dimensions = config.dimensions,
                "vector.index.skipped_wrong_dimension"
            );
        }
        info!(
            property = %config.property,
            dimensions = config.dimensions,
            m = config.m,
            ef_construction = config.ef_construction,
            metric = %config.metric,
            indexed = index.len(),
            "vector.index.create"
        );
        indexes.insert(
            config.property.clone(),
            Arc::new(IndexSlot {
                config,
                index: RwLock::new(index),
            }),
        );
        Ok(())
    }

    /// Whether `property` is indexed.
    pub fn contains(&self, property: &str) -> bool {
        self.indexes.read().contains_key(property)
    }

    /// Metadata for every index, sorted by property.
    pub fn list(&self) -> Vec<VectorIndexInfo> {
        let indexes = self.indexes.read();
        let mut out: Vec<VectorIndexInfo> = indexes
            .values()
            .map(|slot| VectorIndexInfo {
                config: slot.config.clone(),
                len: slot.index.read().len(),
            })
            .collect();
        out.sort_by(|a, b| a.config.property.cmp(&b.config.property));
        out
    }

    /// Definitions of every index, sorted by property.
    pub fn configs(&self) -> Vec<VectorIndexConfig> {
        self.list().into_iter().map(|info| info.config).collect()
    }

    fn slot(&self, property: &str) -> Result<Arc<IndexSlot>> {
        self.indexes
            .read()
            .get(property)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(Entity::VectorIndex(property.to_string())))
    }

    /// Metadata of one index.
    pub fn info(&self, property: &str) -> Result<VectorIndexInfo> {
        let slot = self.slot(property)?;
        let len = slot.index.read().len();
        Ok(VectorIndexInfo {
            config: slot.config.clone(),
            len,
        })
    }

    /// Metric of one index.
    pub fn metric(&self, property: &str) -> Result<VectorMetric> {
        Ok(self.slot(property)?.config.metric)
    }

    /// Removes an index. Node properties are untouched.
    pub fn drop_index(&self, property: &str) -> Result<()> {
        match self.indexes.write().remove(property) {
            Some(_) => {
                info!(property, "vector.index.drop");
                Ok(())
            }
            None => Err(GraphError::NotFound(Entity::VectorIndex(property.to_string()))),
        }
    }

    /// Rejects a property map that puts a vector of the wrong length under an
    /// indexed property.
    pub fn check_properties(&self, props: &Properties) -> Result<()> {
        let indexes = self.indexes.read();
        for (name, value) in props {
            if let (Some(slot), Value::Vector(v)) = (indexes.get(name), value) {
                if v.len() != slot.config.dimensions {
                    return Err(GraphError::invalid(format!(
                        "property '{name}' is indexed with {} dimensions, got {}",
                        slot.config.dimensions,
                        v.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Adds a new node to every index whose property it carries.
    pub fn index_node(&self, id: NodeId, props: &Properties) -> Result<()> {
        let indexes = self.indexes.read();
        for (name, slot) in indexes.iter() {
            if let Some(Value::Vector(v)) = props.get(name) {
                if v.len() == slot.config.dimensions {
                    slot.index.write().insert(id, v)?;
                }
            }
        }
        Ok(())
    }

    /// Applies a property patch of `id` to the indexes on the patched
    /// properties. Unchanged vectors are left in place.
    pub fn update_node(&self, id: NodeId, patch: &Properties) -> Result<()> {
        let indexes = self.indexes.read();
        for (name, value) in patch {
            let Some(slot) = indexes.get(name) else {
                continue;
            };
            let mut index = slot.index.write();
            match value {
                Value::Vector(v) if v.len() == slot.config.dimensions => {
                    if index.vector(id) != Some(v.as_slice()) {
                        index.insert(id, v)?;
                    }
                }
                _ => {
                    index.remove(id);
                }
            }
        }
        Ok(())
    }

    /// Removes `id` from every index.
    pub fn remove_node(&self, id: NodeId) {
        let indexes = self.indexes.read();
        for slot in indexes.values() {
            slot.index.write().remove(id);
        }
    }

    /// Nearest neighbors of `query` under the index on `property`.
    ///
    /// `k` must be in `[1, 1000]`; `ef` of `None` or zero means `max(2k, 50)`.
    pub fn search(
        &self,
        property: &str,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
        deadline: &Deadline,
    ) -> Result<Vec<VectorHit>> {
        let slot = self.slot(property)?;
        if !(1..=MAX_K).contains(&k) {
            return Err(GraphError::invalid(format!("k must be in [1, {MAX_K}], got {k}")));
        }
        if query.is_empty() {
            return Err(GraphError::invalid("query vector must not be empty"));
        }
        check_vector(query)?;
        deadline.check()?;
        let ef = match ef {
            Some(ef) if ef > 0 => ef,
            _ => (2 * k).max(MIN_DEFAULT_EF),
        };
        let metric = slot.config.metric;
        let raw = slot.index.read().search(query, k, ef, deadline)?;
        debug!(property, k, ef, hits = raw.len(), "vector.search");
        Ok(raw
            .into_iter()
            .map(|(node_id, distance)| VectorHit {
                node_id,
                distance,
                score: metric.score(distance),
            })
            .collect())
    }
}
