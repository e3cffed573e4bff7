use std::sync::atomic::Ordering;

use tracing::debug;

use super::{GraphStore, Tables};
use crate::storage::model::{Node, NodeSpec};
use crate::storage::record::{Mutation, NodePatch, NodeRemoval};
use crate::types::{
    unix_nanos, validate_properties, GraphError, InternalError, NodeId, Properties, Result,
};

impl GraphStore {
    /// Creates a node and returns it with its assigned id and timestamps.
    pub fn create_node(&self, spec: NodeSpec) -> Result<Node> {
        let mut tables = self.write_tables()?;
        let node = self.insert_node_locked(&mut tables, spec)?;
        debug!(node_id = node.id.0, labels = ?node.labels, "graph.create_node");
        Ok(node)
    }

    /// Validates `spec`, logs it and inserts it. Ids are only consumed once
    /// the WAL append succeeds.
    pub(super) fn insert_node_locked(&self, tables: &mut Tables, spec: NodeSpec) -> Result<Node> {
        self.validate_node_spec(&spec)?;
        let raw = self.next_node_id.load(Ordering::SeqCst);
        if raw == u64::MAX {
            return Err(InternalError::Exhausted("node id").into());
        }
        let now = unix_nanos();
        let node = Node {
            id: NodeId(raw),
            labels: spec.labels,
            properties: spec.properties,
            created_at: now,
            updated_at: now,
        };
        self.commit(tables, &Mutation::CreateNode(node.clone()))?;
        self.next_node_id.store(raw + 1, Ordering::SeqCst);
        self.metrics.node_created();
        Ok(node)
    }

    fn validate_node_spec(&self, spec: &NodeSpec) -> Result<()> {
        if spec.labels.iter().any(String::is_empty) {
            return Err(GraphError::invalid("node label must not be empty"));
        }
        validate_properties(&spec.properties)?;
        self.vectors.check_properties(&spec.properties)
    }

    /// Returns a copy of the node.
    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        self.observe(|| self.read_tables()?.node(id).cloned())
    }

    /// Merges `properties` into the node; keys not named are kept.
    pub fn update_node(&self, id: NodeId, properties: Properties) -> Result<()> {
        let mut tables = self.write_tables()?;
        tables.node(id)?;
        validate_properties(&properties)?;
        self.vectors.check_properties(&properties)?;
        let mutation = Mutation::UpdateNode(NodePatch {
            id,
            properties,
            updated_at: unix_nanos(),
        });
        self.commit(&mut tables, &mutation)?;
        debug!(node_id = id.0, "graph.update_node");
        Ok(())
    }

    /// Deletes the node. Incident edges are left in place.
    pub fn delete_node(&self, id: NodeId) -> Result<()> {
        let mut tables = self.write_tables()?;
        tables.node(id)?;
        self.commit(&mut tables, &Mutation::DeleteNode(NodeRemoval { id }))?;
        self.metrics.node_deleted();
        debug!(node_id = id.0, "graph.delete_node");
        Ok(())
    }

    /// Every node carrying `label`, ordered by id.
    pub fn find_nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        self.observe(|| {
            let tables = self.read_tables()?;
            let Some(ids) = tables.by_label.get(label) else {
                return Ok(Vec::new());
            };
            Ok(ids
                .iter()
                .filter_map(|id| tables.nodes.get(id).cloned())
                .collect())
        })
    }

    /// Whether a live node has this id.
    pub fn contains_node(&self, id: NodeId) -> Result<bool> {
        Ok(self.read_tables()?.nodes.contains_key(&id))
    }

    /// Ids of every live node, ascending.
    pub fn node_ids(&self) -> Result<Vec<NodeId>> {
        let tables = self.read_tables()?;
        let mut ids: Vec<NodeId> = tables.nodes.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
