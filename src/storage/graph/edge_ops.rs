use std::sync::atomic::Ordering;

use tracing::debug;

use super::{GraphStore, Tables};
use crate::storage::model::{Edge, EdgeSpec};
use crate::storage::record::{EdgePatch, EdgeRemoval, Mutation};
use crate::types::{
    unix_nanos, validate_properties, EdgeId, GraphError, InternalError, NodeId, Properties,
    Result,
};

fn check_weight(weight: f64) -> Result<()> {
    if weight.is_finite() {
        Ok(())
    } else {
        Err(GraphError::invalid("edge weight must be finite"))
    }
}

impl GraphStore {
    /// Creates a directed edge between two live nodes.
    pub fn create_edge(&self, spec: EdgeSpec) -> Result<Edge> {
        let mut tables = self.write_tables()?;
        let edge = self.insert_edge_locked(&mut tables, spec)?;
        debug!(
            edge_id = edge.id.0,
            from = edge.from.0,
            to = edge.to.0,
            edge_type = %edge.edge_type,
            "graph.create_edge"
        );
        Ok(edge)
    }

    pub(super) fn insert_edge_locked(&self, tables: &mut Tables, spec: EdgeSpec) -> Result<Edge> {
        if spec.edge_type.is_empty() {
            return Err(GraphError::invalid("edge type must not be empty"));
        }
        check_weight(spec.weight)?;
        validate_properties(&spec.properties)?;
        tables.node(spec.from)?;
        tables.node(spec.to)?;
        let raw = self.next_edge_id.load(Ordering::SeqCst);
        if raw == u64::MAX {
            return Err(InternalError::Exhausted("edge id").into());
        }
        let edge = Edge {
            id: EdgeId(raw),
            from: spec.from,
            to: spec.to,
            edge_type: spec.edge_type,
            properties: spec.properties,
            weight: spec.weight,
            created_at: unix_nanos(),
        };
        self.commit(tables, &Mutation::CreateEdge(edge.clone()))?;
        self.next_edge_id.store(raw + 1, Ordering::SeqCst);
        self.metrics.edge_created();
        Ok(edge)
    }

    /// Returns a copy of the edge.
    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        self.observe(|| self.read_tables()?.edge(id).cloned())
    }

    /// Merges `properties` into the edge and optionally replaces its weight.
    pub fn update_edge(
        &self,
        id: EdgeId,
        properties: Properties,
        weight: Option<f64>,
    ) -> Result<()> {
        let mut tables = self.write_tables()?;
        tables.edge(id)?;
        validate_properties(&properties)?;
        if let Some(weight) = weight {
            check_weight(weight)?;
        }
        let mutation = Mutation::UpdateEdge(EdgePatch {
            id,
            properties,
            weight,
        });
        self.commit(&mut tables, &mutation)?;
        debug!(edge_id = id.0, "graph.update_edge");
        Ok(())
    }

    /// Deletes the edge and unlinks it from both endpoints.
    pub fn delete_edge(&self, id: EdgeId) -> Result<()> {
        let mut tables = self.write_tables()?;
        tables.edge(id)?;
        self.commit(&mut tables, &Mutation::DeleteEdge(EdgeRemoval { id }))?;
        self.metrics.edge_deleted();
        debug!(edge_id = id.0, "graph.delete_edge");
        Ok(())
    }

    /// Edges leaving `id`, in creation order.
    pub fn get_outgoing_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        self.observe(|| {
            let tables = self.read_tables()?;
            tables.node(id)?;
            Ok(tables.edges_of(tables.outgoing.get(&id)))
        })
    }

    /// Edges arriving at `id`, in creation order.
    pub fn get_incoming_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        self.observe(|| {
            let tables = self.read_tables()?;
            tables.node(id)?;
            Ok(tables.edges_of(tables.incoming.get(&id)))
        })
    }

    /// Every edge of `edge_type`, ordered by id.
    pub fn find_edges_by_type(&self, edge_type: &str) -> Result<Vec<Edge>> {
        self.observe(|| {
            let tables = self.read_tables()?;
            let Some(ids) = tables.by_type.get(edge_type) else {
                return Ok(Vec::new());
            };
            Ok(ids
                .iter()
                .filter_map(|id| tables.edges.get(id).cloned())
                .collect())
        })
    }
}
