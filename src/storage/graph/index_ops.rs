use tracing::debug;

use super::GraphStore;
use crate::primitives::concurrency::Deadline;
use crate::storage::record::{IndexRemoval, Mutation};
use crate::types::{Entity, GraphError, Result};
use crate::vector::{VectorHit, VectorIndexConfig, VectorIndexInfo, VectorMetric};

impl GraphStore {
    /// Creates an HNSW index over the vector property `property` and fills it
    /// from the current nodes. Zero `m` or `ef_construction` take the defaults.
    pub fn create_vector_index(
        &self,
        property: &str,
        dimensions: usize,
        m: usize,
        ef_construction: usize,
        metric: VectorMetric,
    ) -> Result<()> {
        let config = VectorIndexConfig::new(property, dimensions, m, ef_construction, metric)?;
        let mut tables = self.write_tables()?;
        self.vectors.ensure_absent(property)?;
        self.commit(&mut tables, &Mutation::CreateVectorIndex(config))?;
        Ok(())
    }

    /// Whether `property` is indexed.
    pub fn has_vector_index(&self, property: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.vectors.contains(property))
    }

    /// Every index, sorted by property name.
    pub fn list_vector_indexes(&self) -> Result<Vec<VectorIndexInfo>> {
        self.ensure_open()?;
        Ok(self.vectors.list())
    }

    /// Metadata of one index.
    pub fn vector_index_info(&self, property: &str) -> Result<VectorIndexInfo> {
        self.ensure_open()?;
        self.vectors.info(property)
    }

    /// Distance metric of the index on `property`.
    pub fn vector_index_metric(&self, property: &str) -> Result<VectorMetric> {
        self.ensure_open()?;
        self.vectors.metric(property)
    }

    /// Drops the index on `property`. Node properties are kept.
    pub fn drop_vector_index(&self, property: &str) -> Result<()> {
        let mut tables = self.write_tables()?;
        if !self.vectors.contains(property) {
            return Err(GraphError::NotFound(Entity::VectorIndex(property.to_string())));
        }
        let removal = IndexRemoval {
            property: property.to_string(),
        };
        self.commit(&mut tables, &Mutation::DropVectorIndex(removal))?;
        Ok(())
    }

    /// The `k` nodes nearest to `query`, nearest first, within the store's
    /// algorithm budget.
    pub fn vector_search(
        &self,
        property: &str,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
    ) -> Result<Vec<VectorHit>> {
        self.vector_search_until(property, query, k, ef, &self.deadline())
    }

    /// [`GraphStore::vector_search`] bounded by the caller's deadline.
    pub fn vector_search_until(
        &self,
        property: &str,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
        deadline: &Deadline,
    ) -> Result<Vec<VectorHit>> {
        self.observe(|| {
            let _tables = self.read_tables()?;
            let hits = self.vectors.search(property, query, k, ef, deadline)?;
            self.metrics.vector_search(hits.len());
            debug!(property, k, hits = hits.len(), "graph.vector_search");
            Ok(hits)
        })
    }
}
