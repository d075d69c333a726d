//! Canonical snapshot form of a graph map
//!
//! Only nodes (key, tags, declared index names) and edges (from, to, type,
//! tags) are written. Tag and unique indexes are rebuilt on load by replaying
//! the nodes and edges through the normal `add` path.

use super::edge::GraphEdge;
use super::error::GraphResult;
use super::map::GraphMap;
use super::node::GraphNode;
use serde::{Deserialize, Serialize};

/// Serialized graph: full node list and full edge list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSerialization {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphSerialization {
    /// Encode as JSON bytes
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode from JSON bytes
    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

impl GraphMap {
    pub fn to_serialization(&self) -> GraphSerialization {
        GraphSerialization {
            nodes: self.nodes().iter().cloned().collect(),
            edges: self.edges().iter().cloned().collect(),
        }
    }

    /// Rebuild a map, including every derived index, from its serialized form
    pub fn from_serialization(serialization: GraphSerialization) -> GraphResult<Self> {
        GraphMap::from_parts(serialization.nodes, serialization.edges)
    }
}
