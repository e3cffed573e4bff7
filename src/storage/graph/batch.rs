use tracing::{debug, info};

use super::GraphStore;
use crate::storage::model::{EdgeSpec, NodeSpec};
use crate::types::{GraphError, Result};

/// Largest number of items a batch call accepts.
pub const MAX_BATCH_SIZE: usize = 1000;

fn check_batch_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(GraphError::invalid("batch must not be empty"));
    }
    if len > MAX_BATCH_SIZE {
        return Err(GraphError::invalid(format!(
            "batch of {len} items exceeds the limit of {MAX_BATCH_SIZE}"
        )));
    }
    Ok(())
}

/// Whether a per-item failure is absorbed by a batch. Storage faults are not.
fn skippable(err: &GraphError) -> bool {
    !matches!(err, GraphError::Internal(_))
}

impl GraphStore {
    /// Creates up to [`MAX_BATCH_SIZE`] nodes and returns how many were
    /// created. Items that fail validation are skipped; a WAL or storage
    /// fault stops the batch and is returned.
    pub fn create_nodes(&self, specs: Vec<NodeSpec>) -> Result<usize> {
        check_batch_len(specs.len())?;
        let requested = specs.len();
        let mut tables = self.write_tables()?;
        let mut created = 0;
        for (idx, spec) in specs.into_iter().enumerate() {
            match self.insert_node_locked(&mut tables, spec) {
                Ok(_) => created += 1,
                Err(err) if skippable(&err) => {
                    debug!(index = idx, error = %err, "graph.batch.skip_node");
                }
                Err(err) => return Err(err),
            }
        }
        info!(requested, created, "graph.batch.create_nodes");
        Ok(created)
    }

    /// Edge counterpart of [`GraphStore::create_nodes`]. Items naming a
    /// missing endpoint are skipped.
    pub fn create_edges(&self, specs: Vec<EdgeSpec>) -> Result<usize> {
        check_batch_len(specs.len())?;
        let requested = specs.len();
        let mut tables = self.write_tables()?;
        let mut created = 0;
        for (idx, spec) in specs.into_iter().enumerate() {
            match self.insert_edge_locked(&mut tables, spec) {
                Ok(_) => created += 1,
                Err(err) if skippable(&err) => {
                    debug!(index = idx, error = %err, "graph.batch.skip_edge");
                }
                Err(err) => return Err(err),
            }
        }
        info!(requested, created, "graph.batch.create_edges");
        Ok(created)
    }
}
