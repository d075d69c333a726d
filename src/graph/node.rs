//! Node implementation for the graph map
//!
//! Nodes are immutable values: every "mutation" builds a new node that
//! replaces the stored one by key.

use super::error::GraphResult;
use super::tags::{parse_indexes, parse_tags, IndexNames, Tags};
use super::types::Key;
use crate::index::IndexEntry;
use serde::{Deserialize, Serialize};

/// A node in the graph map
///
/// Nodes have:
/// - A key, unique (case-insensitively) within the map
/// - An ordered tag set
/// - The set of tag names maintained as unique value indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    key: Key,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    tags: Tags,

    #[serde(default, skip_serializing_if = "IndexNames::is_empty")]
    indexes: IndexNames,
}

impl GraphNode {
    /// Create a node with no tags
    pub fn new(key: impl Into<Key>) -> Self {
        GraphNode {
            key: key.into(),
            tags: Tags::new(),
            indexes: IndexNames::new(),
        }
    }

    /// Create a node from tag and index strings
    pub fn parse(key: impl Into<Key>, tags: &str, indexes: &str) -> GraphResult<Self> {
        GraphNode::new(key).with_tags(tags)?.with_indexes(indexes)
    }

    /// Apply a tag delta such as `name=marko,-lang`
    pub fn with_tags(mut self, delta: &str) -> GraphResult<Self> {
        self.tags.apply(parse_tags(delta)?);
        Ok(self)
    }

    /// Apply an index delta such as `name,-lang`
    pub fn with_indexes(mut self, delta: &str) -> GraphResult<Self> {
        self.indexes.apply(parse_indexes(delta)?);
        Ok(self)
    }

    /// Set a single tag
    pub fn with_tag(mut self, name: impl Into<Key>, value: Option<&str>) -> Self {
        self.tags.insert(name, value.map(str::to_string));
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn indexes(&self) -> &IndexNames {
        &self.indexes
    }

    /// Whether this value carries removal directives (only valid for `set`)
    pub fn has_directives(&self) -> bool {
        self.tags.has_removals() || self.indexes.has_removals()
    }

    /// Unique-index registrations this node makes: one per declared index
    /// whose tag is present with a value
    pub fn index_entries(&self) -> Vec<IndexEntry> {
        self.indexes
            .iter()
            .filter_map(|name| {
                self.tags
                    .value(name.as_str())
                    .map(|value| IndexEntry::new(name.clone(), value))
            })
            .collect()
    }

    /// Apply this node as a delta onto the stored node with the same key
    pub(crate) fn merge_onto(&self, stored: &GraphNode) -> GraphNode {
        GraphNode {
            key: stored.key.clone(),
            tags: stored.tags.merge(&self.tags),
            indexes: stored.indexes.merge(&self.indexes),
        }
    }

    pub(crate) fn into_effective(self) -> GraphNode {
        GraphNode {
            key: self.key,
            tags: self.tags.into_effective(),
            indexes: self.indexes.into_effective(),
        }
    }
}
