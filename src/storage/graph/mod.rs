use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use tracing::{info, warn};

use super::metrics::{default_metrics, Statistics, StatsCounters, StorageMetrics};
use super::model::{Edge, Node};
use super::options::StoreOptions;
use super::record::Mutation;
use crate::algorithms::GraphRead;
use crate::primitives::concurrency::Deadline;
use crate::primitives::io::{DiscardFileIo, FileIo, StdFileIo};
use crate::primitives::wal::{Wal, WalOptions, WalRecovery, WalStats};
use crate::types::{EdgeId, Entity, GraphError, InternalError, Lsn, NodeId, Result};
use crate::vector::VectorRegistry;

mod batch;
mod checkpoint;
mod edge_ops;
mod index_ops;
mod node_ops;

pub use batch::MAX_BATCH_SIZE;

/// File name of the write-ahead log inside the data directory.
pub const WAL_FILE_NAME: &str = "wal.log";
/// File name of the checkpoint snapshot inside the data directory.
pub const SNAPSHOT_FILE_NAME: &str = "snapshot.json";

/// In-memory node and edge tables plus their secondary indexes.
#[derive(Default)]
pub(crate) struct Tables {
    nodes: FxHashMap<NodeId, Node>,
    edges: FxHashMap<EdgeId, Edge>,
    /// Edge ids per source node, in creation order.
    outgoing: FxHashMap<NodeId, Vec<EdgeId>>,
    /// Edge ids per target node, in creation order.
    incoming: FxHashMap<NodeId, Vec<EdgeId>>,
    by_label: FxHashMap<String, BTreeSet<NodeId>>,
    by_type: FxHashMap<String, BTreeSet<EdgeId>>,
}

impl Tables {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or(GraphError::NotFound(Entity::Node(id)))
    }

    fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges
            .get(&id)
            .ok_or(GraphError::NotFound(Entity::Edge(id)))
    }

    /// Live nodes ordered by id; index builds use this order.
    fn nodes_by_id(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_unstable_by_key(|n| n.id);
        nodes
    }

    fn edges_of(&self, list: Option<&Vec<EdgeId>>) -> Vec<Edge> {
        list.map(|ids| {
            ids.iter()
                .filter_map(|id| self.edges.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }

    fn insert_node(&mut self, node: Node) {
        for label in &node.labels {
            self.by_label
                .entry(label.clone())
                .or_default()
                .insert(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    fn insert_edge(&mut self, edge: Edge) {
        self.outgoing.entry(edge.from).or_default().push(edge.id);
        self.incoming.entry(edge.to).or_default().push(edge.id);
        self.by_type
            .entry(edge.edge_type.clone())
            .or_default()
            .insert(edge.id);
        self.edges.insert(edge.id, edge);
    }

    /// Applies a logged mutation. Shared by the live write path and replay.
    fn apply(&mut self, mutation: &Mutation, vectors: &VectorRegistry) -> Result<()> {
        match mutation {
            Mutation::CreateNode(node) => {
                vectors.index_node(node.id, &node.properties)?;
                self.insert_node(node.clone());
            }
            Mutation::UpdateNode(patch) => {
                let node = self
                    .nodes
                    .get_mut(&patch.id)
                    .ok_or(GraphError::NotFound(Entity::Node(patch.id)))?;
                for (name, value) in &patch.properties {
                    node.properties.insert(name.clone(), value.clone());
                }
                node.updated_at = patch.updated_at;
                vectors.update_node(node.id, &patch.properties)?;
            }
            Mutation::DeleteNode(removal) => {
                let node = self
                    .nodes
                    .remove(&removal.id)
                    .ok_or(GraphError::NotFound(Entity::Node(removal.id)))?;
                for label in &node.labels {
                    if let Some(set) = self.by_label.get_mut(label) {
                        set.remove(&node.id);
                        if set.is_empty() {
                            self.by_label.remove(label);
                        }
                    }
                }
                vectors.remove_node(node.id);
            }
            Mutation::CreateEdge(edge) => self.insert_edge(edge.clone()),
            Mutation::UpdateEdge(patch) => {
                let edge = self
                    .edges
                    .get_mut(&patch.id)
                    .ok_or(GraphError::NotFound(Entity::Edge(patch.id)))?;
                for (name, value) in &patch.properties {
                    edge.properties.insert(name.clone(), value.clone());
                }
                if let Some(weight) = patch.weight {
                    edge.weight = weight;
                }
            }
            Mutation::DeleteEdge(removal) => {
                let edge = self
                    .edges
                    .remove(&removal.id)
                    .ok_or(GraphError::NotFound(Entity::Edge(removal.id)))?;
                if let Some(list) = self.outgoing.get_mut(&edge.from) {
                    list.retain(|id| *id != edge.id);
                }
                if let Some(list) = self.incoming.get_mut(&edge.to) {
                    list.retain(|id| *id != edge.id);
                }
                if let Some(set) = self.by_type.get_mut(&edge.edge_type) {
                    set.remove(&edge.id);
                    if set.is_empty() {
                        self.by_type.remove(&edge.edge_type);
                    }
                }
            }
            Mutation::CreateVectorIndex(config) => {
                let nodes = self.nodes_by_id();
                vectors.create(
                    config.clone(),
                    nodes.into_iter().map(|n| (n.id, &n.properties)),
                )?;
            }
            Mutation::DropVectorIndex(removal) => vectors.drop_index(&removal.property)?,
        }
        Ok(())
    }
}

/// Graph store: node and edge tables, the WAL that makes them durable, and
/// the vector indexes over node properties.
///
/// Every mutation takes the table write lock, appends to the WAL and only then
/// applies the change in memory, so log order always matches the order in
/// which mutations became visible. Reads share the table read lock.
pub struct GraphStore {
    wal: Wal,
    tables: RwLock<Tables>,
    vectors: VectorRegistry,
    stats: StatsCounters,
    metrics: Arc<dyn StorageMetrics>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    closed: AtomicBool,
    data_dir: Option<PathBuf>,
    algorithm_timeout: Duration,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("data_dir", &self.data_dir)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// What happened while a store was opened.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenReport {
    /// LSN covered by the loaded snapshot, if any.
    pub snapshot_lsn: Option<Lsn>,
    /// WAL recovery outcome.
    pub wal: WalRecovery,
    /// Entries applied on top of the snapshot.
    pub replayed: u64,
    /// Entries already covered by the snapshot.
    pub skipped_covered: u64,
    /// Entries that could not be decoded or applied.
    pub skipped_invalid: u64,
}

impl GraphStore {
    /// Opens a store, running snapshot load and WAL replay to completion
    /// before returning. Without a data directory the log is still encoded
    /// and counted but its bytes are dropped.
    pub fn open(options: StoreOptions) -> Result<Self> {
        let io: Arc<dyn FileIo> = match &options.data_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Arc::new(StdFileIo::open(dir.join(WAL_FILE_NAME))?)
            }
            None => Arc::new(DiscardFileIo),
        };
        Self::open_with_io(options, io)
    }

    /// Opens a store whose WAL lives on `wal_io`. The snapshot, if any, is
    /// still read from `options.data_dir`.
    pub fn open_with_io(options: StoreOptions, wal_io: Arc<dyn FileIo>) -> Result<Self> {
        Ok(Self::open_reporting(options, wal_io)?.0)
    }

    /// Like [`GraphStore::open_with_io`], also returning what recovery did.
    pub fn open_reporting(
        options: StoreOptions,
        wal_io: Arc<dyn FileIo>,
    ) -> Result<(Self, OpenReport)> {
        let started = Instant::now();
        let snapshot = match &options.data_dir {
            Some(dir) => checkpoint::load_snapshot(dir)?,
            None => None,
        };
        let snapshot_lsn = snapshot.as_ref().map(|s| s.lsn);
        let start_lsn = snapshot_lsn
            .map_or(Some(Lsn(1)), Lsn::next)
            .ok_or(InternalError::Exhausted("log sequence number"))?;
        let wal = Wal::open(
            wal_io,
            WalOptions {
                sync_mode: options.wal_sync,
                start_lsn,
            },
        )?;
        let store = Self {
            wal,
            tables: RwLock::new(Tables::default()),
            vectors: VectorRegistry::new(options.hnsw_seed),
            stats: StatsCounters::default(),
            metrics: options.metrics.clone().unwrap_or_else(default_metrics),
            next_node_id: AtomicU64::new(1),
            next_edge_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            data_dir: options.data_dir.clone(),
            algorithm_timeout: options.algorithm_timeout,
        };
        let mut report = OpenReport {
            snapshot_lsn,
            wal: store.wal.recovery().clone(),
            ..OpenReport::default()
        };
        if let Some(snapshot) = snapshot {
            store.restore(snapshot)?;
        }
        store.replay(snapshot_lsn.unwrap_or(Lsn(0)), &mut report)?;
        let stats = store.stats.snapshot();
        info!(
            data_dir = ?store.data_dir,
            nodes = stats.node_count,
            edges = stats.edge_count,
            lsn = store.wal.current_lsn().0,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "graph.open"
        );
        Ok((store, report))
    }

    fn replay(&self, covered: Lsn, report: &mut OpenReport) -> Result<()> {
        let mut tables = self.tables.write();
        let mut iter = self.wal.iter()?;
        while let Some(entry) = iter.next_entry()? {
            if entry.lsn <= covered {
                report.skipped_covered += 1;
                continue;
            }
            let mutation = match Mutation::decode(entry.op, &entry.data) {
                Ok(mutation) => mutation,
                Err(err) => {
                    warn!(
                        lsn = entry.lsn.0,
                        op = ?entry.op,
                        error = %err,
                        "graph.replay.skip_entry"
                    );
                    report.skipped_invalid += 1;
                    continue;
                }
            };
            self.observe_ids(&mutation);
            if let Err(err) = tables.apply(&mutation, &self.vectors) {
                warn!(lsn = entry.lsn.0, op = ?entry.op, error = %err, "graph.replay.skip_entry");
                report.skipped_invalid += 1;
                continue;
            }
            report.replayed += 1;
        }
        self.refresh_counts(&tables);
        info!(
            replayed = report.replayed,
            skipped_covered = report.skipped_covered,
            skipped_invalid = report.skipped_invalid,
            "graph.replay.complete"
        );
        Ok(())
    }

    /// Keeps the id allocators ahead of every id seen in the log.
    fn observe_ids(&self, mutation: &Mutation) {
        match mutation {
            Mutation::CreateNode(node) => {
                self.next_node_id
                    .fetch_max(node.id.0.saturating_add(1), Ordering::SeqCst);
            }
            Mutation::CreateEdge(edge) => {
                self.next_edge_id
                    .fetch_max(edge.id.0.saturating_add(1), Ordering::SeqCst);
            }
            _ => {}
        }
    }

    fn refresh_counts(&self, tables: &Tables) {
        self.stats
            .set_counts(tables.nodes.len() as u64, tables.edges.len() as u64);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(InternalError::Closed.into());
        }
        Ok(())
    }

    /// Table write lock; fails once the store is closed.
    fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        let tables = self.tables.write();
        self.ensure_open()?;
        Ok(tables)
    }

    /// Table read lock; fails once the store is closed.
    fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        let tables = self.tables.read();
        self.ensure_open()?;
        Ok(tables)
    }

    /// Logs `mutation`, then applies it. The caller holds the write lock and
    /// has validated the mutation.
    fn commit(&self, tables: &mut Tables, mutation: &Mutation) -> Result<Lsn> {
        let data = mutation.encode()?;
        let bytes = data.len() as u64;
        let lsn = self.wal.append(mutation.op_type(), data)?;
        self.metrics.wal_appended(bytes);
        tables.apply(mutation, &self.vectors)?;
        self.refresh_counts(tables);
        Ok(lsn)
    }

    /// Runs a read and folds its latency into the statistics.
    fn observe<T>(&self, read: impl FnOnce() -> Result<T>) -> Result<T> {
        let started = Instant::now();
        let out = read();
        self.stats.record_query(started.elapsed());
        out
    }

    /// Counters and the moving average of read latency.
    pub fn statistics(&self) -> Statistics {
        self.stats.snapshot()
    }

    /// LSN of the last durable mutation.
    pub fn current_lsn(&self) -> Lsn {
        self.wal.current_lsn()
    }

    /// WAL counters since open or the last checkpoint.
    pub fn wal_stats(&self) -> WalStats {
        self.wal.stats()
    }

    /// Deadline using the configured algorithm budget.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.algorithm_timeout)
    }

    /// Forces the WAL to stable storage.
    pub fn sync(&self) -> Result<()> {
        let _tables = self.read_tables()?;
        self.wal.sync()
    }

    /// Flushes the WAL and closes the store. Every later call, including a
    /// second `close`, fails with `Internal(Closed)`.
    pub fn close(&self) -> Result<()> {
        let _tables = self.tables.write();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(InternalError::Closed.into());
        }
        self.wal.sync()?;
        info!(lsn = self.wal.current_lsn().0, "graph.close");
        Ok(())
    }

    /// Whether [`GraphStore::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for GraphStore {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            if let Err(err) = self.wal.sync() {
                warn!(error = %err, "graph.drop.sync_failed");
            }
        }
    }
}

impl GraphRead for GraphStore {
    fn node(&self, id: NodeId) -> Result<Node> {
        self.read_tables()?.node(id).cloned()
    }

    fn contains_node(&self, id: NodeId) -> Result<bool> {
        GraphStore::contains_node(self, id)
    }

    fn outgoing(&self, id: NodeId) -> Result<Vec<Edge>> {
        let tables = self.read_tables()?;
        tables.node(id)?;
        Ok(tables.edges_of(tables.outgoing.get(&id)))
    }

    fn node_ids(&self) -> Result<Vec<NodeId>> {
        GraphStore::node_ids(self)
    }
}
