//! Logical mutations as they are written to the WAL.
//!
//! The op type lives in the WAL entry header; the payload is the JSON body of
//! the matching record below.

use serde::{Deserialize, Serialize};

use super::model::{Edge, Node};
use crate::primitives::wal::OpType;
use crate::types::{EdgeId, NodeId, Properties, Result};
use crate::vector::VectorIndexConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct NodePatch {
    pub id: NodeId,
    pub properties: Properties,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct EdgePatch {
    pub id: EdgeId,
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct NodeRemoval {
    pub id: NodeId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct EdgeRemoval {
    pub id: EdgeId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexRemoval {
    pub property: String,
}

/// A mutation that changes store state.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Mutation {
    CreateNode(Node),
    UpdateNode(NodePatch),
    DeleteNode(NodeRemoval),
    CreateEdge(Edge),
    UpdateEdge(EdgePatch),
    DeleteEdge(EdgeRemoval),
    CreateVectorIndex(VectorIndexConfig),
    DropVectorIndex(IndexRemoval),
}

impl Mutation {
    pub(crate) fn op_type(&self) -> OpType {
        match self {
            Mutation::CreateNode(_) => OpType::CreateNode,
            Mutation::UpdateNode(_) => OpType::UpdateNode,
            Mutation::DeleteNode(_) => OpType::DeleteNode,
            Mutation::CreateEdge(_) => OpType::CreateEdge,
            Mutation::UpdateEdge(_) => OpType::UpdateEdge,
            Mutation::DeleteEdge(_) => OpType::DeleteEdge,
            Mutation::CreateVectorIndex(_) => OpType::CreateVectorIndex,
            Mutation::DropVectorIndex(_) => OpType::DropVectorIndex,
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Mutation::CreateNode(node) => serde_json::to_vec(node)?,
            Mutation::UpdateNode(patch) => serde_json::to_vec(patch)?,
            Mutation::DeleteNode(removal) => serde_json::to_vec(removal)?,
            Mutation::CreateEdge(edge) => serde_json::to_vec(edge)?,
            Mutation::UpdateEdge(patch) => serde_json::to_vec(patch)?,
            Mutation::DeleteEdge(removal) => serde_json::to_vec(removal)?,
            Mutation::CreateVectorIndex(config) => serde_json::to_vec(config)?,
            Mutation::DropVectorIndex(removal) => serde_json::to_vec(removal)?,
        };
        Ok(bytes)
    }

    pub(crate) fn decode(op: OpType, data: &[u8]) -> Result<Self> {
        Ok(match op {
            OpType::CreateNode => Mutation::CreateNode(serde_json::from_slice(data)?),
            OpType::UpdateNode => Mutation::UpdateNode(serde_json::from_slice(data)?),
            OpType::DeleteNode => Mutation::DeleteNode(serde_json::from_slice(data)?),
            OpType::CreateEdge => Mutation::CreateEdge(serde_json::from_slice(data)?),
            OpType::UpdateEdge => Mutation::UpdateEdge(serde_json::from_slice(data)?),
            OpType::DeleteEdge => Mutation::DeleteEdge(serde_json::from_slice(data)?),
            OpType::CreateVectorIndex => {
                Mutation::CreateVectorIndex(serde_json::from_slice(data)?)
            }
            OpType::DropVectorIndex => Mutation::DropVectorIndex(serde_json::from_slice(data)?),
        })
    }
}
