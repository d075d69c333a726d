//! In-memory graph map
//!
//! The aggregate root owning the node and edge collections. All mutation is
//! synchronous and CPU-only; persistence is handled by
//! [`crate::persistence::GraphMapStore`].

use super::collection::{EdgeCollection, NodeCollection};
use super::edge::GraphEdge;
use super::error::{GraphError, GraphResult};
use super::node::GraphNode;
use super::search::Search;
use super::types::EdgeKey;
use serde::{Deserialize, Serialize};

/// Counts describing a graph map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub node_tag_count: usize,
    pub edge_tag_count: usize,
    pub unique_index_entries: usize,
}

/// Node/edge graph with derived tag and unique indexes
#[derive(Debug, Clone, Default)]
pub struct GraphMap {
    nodes: NodeCollection,
    edges: EdgeCollection,
}

impl GraphMap {
    /// Create an empty graph map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from literal nodes and edges with `add` semantics;
    /// the first invariant violation (e.g. a duplicate key) fails the build
    pub fn from_parts(
        nodes: impl IntoIterator<Item = GraphNode>,
        edges: impl IntoIterator<Item = GraphEdge>,
    ) -> GraphResult<Self> {
        let mut map = GraphMap::new();
        for node in nodes {
            map.add_node(node)?;
        }
        for edge in edges {
            map.add_edge(edge)?;
        }
        Ok(map)
    }

    pub fn nodes(&self) -> &NodeCollection {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeCollection {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn get_node(&self, key: &str) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    pub fn get_edge(&self, key: &EdgeKey) -> Option<&GraphEdge> {
        self.edges.get(key)
    }

    /// Add a node; fails if the key exists or a unique index collides
    pub fn add_node(&mut self, node: GraphNode) -> GraphResult<()> {
        self.nodes.add(node)
    }

    /// Upsert a node, applying its tags/indexes as a delta
    pub fn set_node(&mut self, node: GraphNode) -> GraphResult<()> {
        self.nodes.set(node)
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, key: &str) -> GraphResult<GraphNode> {
        let node = self.nodes.remove(key)?;
        self.edges.remove_node_edges(key);
        Ok(node)
    }

    /// Add an edge between two existing nodes
    pub fn add_edge(&mut self, edge: GraphEdge) -> GraphResult<()> {
        self.check_endpoints(&edge)?;
        self.edges.add(edge)
    }

    /// Upsert an edge, applying its tags as a delta
    pub fn set_edge(&mut self, edge: GraphEdge) -> GraphResult<()> {
        self.check_endpoints(&edge)?;
        self.edges.set(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, key: &EdgeKey) -> GraphResult<GraphEdge> {
        self.edges.remove(key)
    }

    /// Read-only query surface over the current state
    pub fn search(&self) -> Search<'_> {
        Search::new(self)
    }

    /// Empty nodes, edges and all derived indexes
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            node_tag_count: self.nodes.tag_count(),
            edge_tag_count: self.edges.tag_count(),
            unique_index_entries: self.nodes.unique_index().len(),
        }
    }

    fn check_endpoints(&self, edge: &GraphEdge) -> GraphResult<()> {
        if !self.nodes.contains(edge.from_key().as_str()) {
            return Err(GraphError::InvalidEdgeSource(edge.from_key().to_string()));
        }
        if !self.nodes.contains(edge.to_key().as_str()) {
            return Err(GraphError::InvalidEdgeTarget(edge.to_key().to_string()));
        }
        Ok(())
    }
}
