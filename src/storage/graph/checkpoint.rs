use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GraphStore, Tables, SNAPSHOT_FILE_NAME};
use crate::storage::model::{Edge, Node};
use crate::types::{GraphError, InternalError, Lsn, Result};
use crate::vector::VectorIndexConfig;

const SNAPSHOT_VERSION: u32 = 1;

/// Full in-memory state as of `lsn`.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct Snapshot {
    pub(super) version: u32,
    pub(super) lsn: Lsn,
    pub(super) next_node_id: u64,
    pub(super) next_edge_id: u64,
    pub(super) nodes: Vec<Node>,
    pub(super) edges: Vec<Edge>,
    pub(super) vector_indexes: Vec<VectorIndexConfig>,
}

pub(super) fn load_snapshot(dir: &Path) -> Result<Option<Snapshot>> {
    let path = dir.join(SNAPSHOT_FILE_NAME);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(InternalError::Corruption("unsupported snapshot version").into());
    }
    debug!(
        lsn = snapshot.lsn.0,
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "graph.snapshot.load"
    );
    Ok(Some(snapshot))
}

fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let tmp = dir.join(format!("{SNAPSHOT_FILE_NAME}.tmp"));
    let bytes = serde_json::to_vec(snapshot)?;
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, dir.join(SNAPSHOT_FILE_NAME))?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

impl Tables {
    fn sorted_nodes(&self) -> Vec<Node> {
        self.nodes_by_id().into_iter().cloned().collect()
    }

    fn sorted_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self.edges.values().cloned().collect();
        edges.sort_unstable_by_key(|e| e.id);
        edges
    }
}

impl GraphStore {
    /// Writes the full state to `snapshot.json` and empties the WAL. Returns
    /// the LSN the snapshot covers; later appends continue after it.
    pub fn checkpoint(&self) -> Result<Lsn> {
        let Some(dir) = self.data_dir.as_deref() else {
            return Err(GraphError::invalid("checkpoint requires a data directory"));
        };
        let tables = self.write_tables()?;
        let lsn = self.wal.current_lsn();
        let next = lsn
            .next()
            .ok_or(InternalError::Exhausted("log sequence number"))?;
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            lsn,
            next_node_id: self.next_node_id.load(Ordering::SeqCst),
            next_edge_id: self.next_edge_id.load(Ordering::SeqCst),
            nodes: tables.sorted_nodes(),
            edges: tables.sorted_edges(),
            vector_indexes: self.vectors.configs(),
        };
        write_snapshot(dir, &snapshot)?;
        self.wal.reset(next)?;
        info!(
            lsn = lsn.0,
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            vector_indexes = snapshot.vector_indexes.len(),
            "graph.checkpoint"
        );
        Ok(lsn)
    }

    /// Loads a snapshot into the empty tables of a store being opened.
    pub(super) fn restore(&self, snapshot: Snapshot) -> Result<()> {
        let mut tables = self.tables.write();
        for node in snapshot.nodes {
            tables.insert_node(node);
        }
        for edge in snapshot.edges {
            tables.insert_edge(edge);
        }
        self.next_node_id
            .fetch_max(snapshot.next_node_id.max(1), Ordering::SeqCst);
        self.next_edge_id
            .fetch_max(snapshot.next_edge_id.max(1), Ordering::SeqCst);
        for config in snapshot.vector_indexes {
            let nodes = tables.nodes_by_id();
            self.vectors
                .create(config, nodes.into_iter().map(|n| (n.id, &n.properties)))?;
        }
        self.refresh_counts(&tables);
        Ok(())
    }
}
