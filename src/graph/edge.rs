//! Edge implementation for the graph map
//!
//! An edge is identified by `(from, to, edge type)`; two edges between the
//! same pair of nodes need distinct edge types.

use super::error::GraphResult;
use super::tags::{parse_tags, Tags};
use super::types::{EdgeKey, Key};
use serde::{Deserialize, Serialize};

/// Edge type used when none is given
pub const DEFAULT_EDGE_TYPE: &str = "default";

fn default_edge_type() -> Key {
    Key::new(DEFAULT_EDGE_TYPE)
}

/// A directed edge in the graph map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node (edge goes FROM this node)
    from_key: Key,

    /// Target node (edge goes TO this node)
    to_key: Key,

    #[serde(default = "default_edge_type")]
    edge_type: Key,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    tags: Tags,
}

impl GraphEdge {
    /// Create an edge of the default type
    pub fn new(from_key: impl Into<Key>, to_key: impl Into<Key>) -> Self {
        GraphEdge {
            from_key: from_key.into(),
            to_key: to_key.into(),
            edge_type: default_edge_type(),
            tags: Tags::new(),
        }
    }

    /// Create an edge from an edge type and a tag string
    pub fn parse(
        from_key: impl Into<Key>,
        to_key: impl Into<Key>,
        edge_type: impl Into<Key>,
        tags: &str,
    ) -> GraphResult<Self> {
        GraphEdge::new(from_key, to_key)
            .with_edge_type(edge_type)
            .with_tags(tags)
    }

    pub fn with_edge_type(mut self, edge_type: impl Into<Key>) -> Self {
        self.edge_type = edge_type.into();
        self
    }

    /// Apply a tag delta such as `weight=0.4,-since`
    pub fn with_tags(mut self, delta: &str) -> GraphResult<Self> {
        self.tags.apply(parse_tags(delta)?);
        Ok(self)
    }

    pub fn with_tag(mut self, name: impl Into<Key>, value: Option<&str>) -> Self {
        self.tags.insert(name, value.map(str::to_string));
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.from_key, &self.to_key, &self.edge_type)
    }

    pub fn from_key(&self) -> &Key {
        &self.from_key
    }

    pub fn to_key(&self) -> &Key {
        &self.to_key
    }

    pub fn edge_type(&self) -> &Key {
        &self.edge_type
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn has_directives(&self) -> bool {
        self.tags.has_removals()
    }

    /// Check if this edge goes FROM a specific node
    pub fn starts_from(&self, node: &str) -> bool {
        self.from_key.matches(node)
    }

    /// Check if this edge goes TO a specific node
    pub fn ends_at(&self, node: &str) -> bool {
        self.to_key.matches(node)
    }

    /// Check if this edge connects two specific nodes (in either direction)
    pub fn connects(&self, node1: &str, node2: &str) -> bool {
        (self.starts_from(node1) && self.ends_at(node2))
            || (self.starts_from(node2) && self.ends_at(node1))
    }

    pub(crate) fn merge_onto(&self, stored: &GraphEdge) -> GraphEdge {
        GraphEdge {
            from_key: stored.from_key.clone(),
            to_key: stored.to_key.clone(),
            edge_type: stored.edge_type.clone(),
            tags: stored.tags.merge(&self.tags),
        }
    }

    pub(crate) fn into_effective(mut self) -> GraphEdge {
        self.tags = self.tags.into_effective();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_edge() {
        let edge = GraphEdge::new("node1", "node2");
        assert_eq!(edge.edge_type().as_str(), DEFAULT_EDGE_TYPE);
        assert_eq!(edge.key(), EdgeKey::new("node1", "node2", "default"));
        assert!(edge.starts_from("NODE1"));
        assert!(edge.ends_at("node2"));
        assert!(edge.connects("node2", "node1"));
        assert!(!edge.connects("node1", "node3"));
    }

    #[test]
    fn test_parse_edge() {
        let edge = GraphEdge::parse("node1", "node3", "created", "weight=0.4,knows").unwrap();
        assert_eq!(edge.key(), EdgeKey::new("node1", "node3", "created"));
        assert_eq!(edge.tags().value("weight"), Some("0.4"));
        assert!(edge.tags().has("knows"));
    }

    #[test]
    fn test_merge_tags() {
        let stored = GraphEdge::parse("a", "b", "knows", "since=2020,weight=1").unwrap();
        let delta = GraphEdge::new("a", "b")
            .with_edge_type("knows")
            .with_tags("-since,weight=2")
            .unwrap();
        let merged = delta.merge_onto(&stored);
        assert!(!merged.tags().has("since"));
        assert_eq!(merged.tags().value("weight"), Some("2"));
        assert!(!merged.has_directives());
    }

    #[test]
    fn test_default_edge_type_on_deserialize() {
        let edge: GraphEdge =
            serde_json::from_str(r#"{"from_key":"a","to_key":"b"}"#).unwrap();
        assert_eq!(edge.edge_type().as_str(), DEFAULT_EDGE_TYPE);
        assert!(edge.tags().is_empty());
    }
}
