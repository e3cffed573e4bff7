use serde::{Deserialize, Serialize};

use crate::types::{EdgeId, NodeId, Properties, Value};

/// A stored node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique for the lifetime of the store.
    pub id: NodeId,
    /// Labels in insertion order. Duplicates are kept as given.
    pub labels: Vec<String>,
    /// Property map.
    pub properties: Properties,
    /// Creation time, Unix nanoseconds.
    pub created_at: i64,
    /// Time of the last property merge, Unix nanoseconds.
    pub updated_at: i64,
}

impl Node {
    /// Whether the node carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Looks up one property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// A stored directed edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Identifier, unique for the lifetime of the store.
    pub id: EdgeId,
    /// Source node.
    pub from: NodeId,
    /// Target node.
    pub to: NodeId,
    /// Relationship type.
    pub edge_type: String,
    /// Property map.
    pub properties: Properties,
    /// Weight used by weighted algorithms.
    pub weight: f64,
    /// Creation time, Unix nanoseconds.
    pub created_at: i64,
}

impl Edge {
    /// Looks up one property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Whether `from == to`.
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Input to node creation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeSpec {
    /// Labels.
    pub labels: Vec<String>,
    /// Properties.
    pub properties: Properties,
}

impl NodeSpec {
    /// Node with the given labels and no properties.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            properties: Properties::new(),
        }
    }

    /// Adds a property.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// Input to edge creation.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeSpec {
    /// Source node.
    pub from: NodeId,
    /// Target node.
    pub to: NodeId,
    /// Relationship type.
    pub edge_type: String,
    /// Properties.
    pub properties: Properties,
    /// Weight, 1.0 unless set.
    pub weight: f64,
}

impl EdgeSpec {
    /// Edge of weight 1.0 with no properties.
    pub fn new(from: NodeId, to: NodeId, edge_type: impl Into<String>) -> Self {
        Self {
            from,
            to,
            edge_type: edge_type.into(),
            properties: Properties::new(),
            weight: 1.0,
        }
    }

    /// Adds a property.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Sets the weight.
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}
