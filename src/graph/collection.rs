//! Node and edge collections
//!
//! Each collection owns its values together with every index derived from
//! them, so indexes can only change through the collection's own mutators.
//! Mutators validate first and apply afterwards: a failed call leaves the
//! collection exactly as it was.

use super::edge::GraphEdge;
use super::error::{GraphError, GraphResult};
use super::node::GraphNode;
use super::types::{EdgeKey, Key, KeyRef};
use crate::index::{IndexEntry, TagIndex, UniqueIndex};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Nodes keyed by case-insensitive key, plus tag and unique indexes
#[derive(Debug, Clone, Default)]
pub struct NodeCollection {
    nodes: IndexMap<Key, GraphNode>,
    tag_index: TagIndex<Key>,
    unique_index: UniqueIndex,
}

impl NodeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&GraphNode> {
        self.nodes.get(&KeyRef(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(&KeyRef(key))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Keys of the nodes carrying `tag` (any value)
    pub fn lookup_tag(&self, tag: &str) -> Vec<&str> {
        self.tag_index.get(tag).map(|k| k.as_str()).collect()
    }

    /// Key of the node registered for `name=value` in the unique index
    pub fn lookup_index(&self, name: &str, value: &str) -> GraphResult<&str> {
        self.unique_index
            .get(name, value)
            .map(|k| k.as_str())
            .ok_or_else(|| GraphError::IndexNotFound {
                index: name.to_string(),
                value: value.to_string(),
            })
    }

    /// Every unique-index registration attributed to a node
    pub fn lookup_by_node_key(&self, key: &str) -> Vec<&IndexEntry> {
        self.unique_index.for_node(key).collect()
    }

    /// Number of distinct tags carried by at least one node
    pub fn tag_count(&self) -> usize {
        self.tag_index.tag_count()
    }

    pub fn unique_index(&self) -> &UniqueIndex {
        &self.unique_index
    }

    pub(crate) fn add(&mut self, node: GraphNode) -> GraphResult<()> {
        if node.key().is_empty() {
            return Err(GraphError::EmptyKey);
        }
        if self.contains(node.key().as_str()) {
            return Err(GraphError::NodeAlreadyExists(node.key().to_string()));
        }
        if node.has_directives() {
            return Err(GraphError::UnexpectedRemoval(node.key().to_string()));
        }
        self.replace(node)
    }

    /// Upsert: the node's tags and indexes are applied as a delta onto the
    /// stored node with the same key
    pub(crate) fn set(&mut self, node: GraphNode) -> GraphResult<()> {
        if node.key().is_empty() {
            return Err(GraphError::EmptyKey);
        }
        let effective = match self.get(node.key().as_str()) {
            Some(stored) => node.merge_onto(stored),
            None => node.into_effective(),
        };
        self.replace(effective)
    }

    pub(crate) fn remove(&mut self, key: &str) -> GraphResult<GraphNode> {
        let (key, node) = self
            .nodes
            .shift_remove_entry(&KeyRef(key))
            .ok_or_else(|| GraphError::NodeNotFound(key.to_string()))?;

        for tag in node.tags().names() {
            self.tag_index.remove(tag, &key);
        }
        self.unique_index.remove_node(&key);
        Ok(node)
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.tag_index.clear();
        self.unique_index.clear();
    }

    /// Install `effective` under its key, swapping index entries of any
    /// stored node for the new ones
    fn replace(&mut self, effective: GraphNode) -> GraphResult<()> {
        let key = effective.key().clone();
        let entries: IndexSet<IndexEntry> = effective.index_entries().into_iter().collect();

        for entry in &entries {
            if let Err(err) = self.unique_index.check(entry, &key) {
                debug!("Rejected node {}: {}", key, err);
                return Err(err);
            }
        }

        let (stale_tags, stale_entries): (Vec<Key>, Vec<IndexEntry>) = match self.nodes.get(&key) {
            Some(stored) => (
                stored
                    .tags()
                    .names()
                    .filter(|name| !effective.tags().has(name.as_str()))
                    .cloned()
                    .collect(),
                stored
                    .index_entries()
                    .into_iter()
                    .filter(|entry| !entries.contains(entry))
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        for tag in &stale_tags {
            self.tag_index.remove(tag, &key);
        }
        for entry in &stale_entries {
            self.unique_index.remove(entry, &key);
        }

        for tag in effective.tags().names() {
            self.tag_index.insert(tag, &key);
        }
        for entry in entries {
            self.unique_index.insert(entry, &key);
        }
        self.nodes.insert(key, effective);
        Ok(())
    }
}

/// Edges keyed by `(from, to, edge type)`, plus tag index and adjacency
#[derive(Debug, Clone, Default)]
pub struct EdgeCollection {
    edges: IndexMap<EdgeKey, GraphEdge>,
    tag_index: TagIndex<EdgeKey>,
    outgoing: IndexMap<Key, IndexSet<EdgeKey>>,
    incoming: IndexMap<Key, IndexSet<EdgeKey>>,
}

impl EdgeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EdgeKey) -> Option<&GraphEdge> {
        self.edges.get(key)
    }

    pub fn contains(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    /// Primary keys of the edges carrying `tag` (any value)
    pub fn lookup_tag(&self, tag: &str) -> Vec<&EdgeKey> {
        self.tag_index.get(tag).collect()
    }

    /// Edges leaving `node`
    pub fn edges_from(&self, node: &str) -> Vec<&GraphEdge> {
        self.adjacent(&self.outgoing, node)
    }

    /// Edges arriving at `node`
    pub fn edges_to(&self, node: &str) -> Vec<&GraphEdge> {
        self.adjacent(&self.incoming, node)
    }

    /// Edges touching `node` in either direction; self-loops appear once
    pub fn edges_for(&self, node: &str) -> Vec<&GraphEdge> {
        let mut keys: IndexSet<&EdgeKey> = IndexSet::new();
        for side in [&self.outgoing, &self.incoming] {
            if let Some(set) = side.get(&KeyRef(node)) {
                keys.extend(set.iter());
            }
        }
        keys.into_iter().filter_map(|k| self.edges.get(k)).collect()
    }

    pub fn tag_count(&self) -> usize {
        self.tag_index.tag_count()
    }

    fn adjacent<'a>(
        &'a self,
        side: &'a IndexMap<Key, IndexSet<EdgeKey>>,
        node: &str,
    ) -> Vec<&'a GraphEdge> {
        side.get(&KeyRef(node))
            .into_iter()
            .flatten()
            .filter_map(|k| self.edges.get(k))
            .collect()
    }

    pub(crate) fn add(&mut self, edge: GraphEdge) -> GraphResult<()> {
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return Err(GraphError::EdgeAlreadyExists(key.to_string()));
        }
        if edge.has_directives() {
            return Err(GraphError::UnexpectedRemoval(key.to_string()));
        }
        self.replace(key, edge);
        Ok(())
    }

    pub(crate) fn set(&mut self, edge: GraphEdge) {
        let key = edge.key();
        let effective = match self.edges.get(&key) {
            Some(stored) => edge.merge_onto(stored),
            None => edge.into_effective(),
        };
        self.replace(key, effective);
    }

    pub(crate) fn remove(&mut self, key: &EdgeKey) -> GraphResult<GraphEdge> {
        let edge = self
            .edges
            .shift_remove(key)
            .ok_or_else(|| GraphError::EdgeNotFound(key.to_string()))?;

        for tag in edge.tags().names() {
            self.tag_index.remove(tag, key);
        }
        Self::unlink(&mut self.outgoing, &key.from, key);
        Self::unlink(&mut self.incoming, &key.to, key);
        Ok(edge)
    }

    /// Remove every edge touching `node`, returning them
    pub(crate) fn remove_node_edges(&mut self, node: &str) -> Vec<GraphEdge> {
        let mut keys: IndexSet<EdgeKey> = IndexSet::new();
        for side in [&self.outgoing, &self.incoming] {
            if let Some(set) = side.get(&KeyRef(node)) {
                keys.extend(set.iter().cloned());
            }
        }
        keys.iter().filter_map(|k| self.remove(k).ok()).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.edges.clear();
        self.tag_index.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }

    fn replace(&mut self, key: EdgeKey, effective: GraphEdge) {
        if let Some(stored) = self.edges.get(&key) {
            let stale: Vec<Key> = stored
                .tags()
                .names()
                .filter(|name| !effective.tags().has(name.as_str()))
                .cloned()
                .collect();
            for tag in &stale {
                self.tag_index.remove(tag, &key);
            }
        }
        for tag in effective.tags().names() {
            self.tag_index.insert(tag, &key);
        }
        self.outgoing
            .entry(key.from.clone())
            .or_default()
            .insert(key.clone());
        self.incoming
            .entry(key.to.clone())
            .or_default()
            .insert(key.clone());
        self.edges.insert(key, effective);
    }

    fn unlink(side: &mut IndexMap<Key, IndexSet<EdgeKey>>, node: &Key, key: &EdgeKey) {
        if let Some(set) = side.get_mut(node) {
            set.shift_remove(key);
            if set.is_empty() {
                side.shift_remove(node);
            }
        }
    }
}
