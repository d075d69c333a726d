//! Uniqueness-constrained value index: `(index name, value)` -> one node key
//!
//! Keeps a reverse map from node key to its registrations so a node's whole
//! index footprint can be inspected or retracted without a scan.

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::types::{Key, KeyRef};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `(index name, value)` registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexEntry {
    name: Key,
    value: Key,
}

impl IndexEntry {
    pub fn new(name: impl Into<Key>, value: impl Into<Key>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn value(&self) -> &str {
        self.value.as_str()
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Unique value index for nodes
#[derive(Debug, Clone, Default)]
pub struct UniqueIndex {
    entries: IndexMap<IndexEntry, Key>,
    by_node: IndexMap<Key, IndexSet<IndexEntry>>,
}

impl UniqueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node registered for the exact pair, if any
    pub fn owner(&self, entry: &IndexEntry) -> Option<&Key> {
        self.entries.get(entry)
    }

    pub fn get(&self, name: &str, value: &str) -> Option<&Key> {
        self.owner(&IndexEntry::new(name, value))
    }

    /// All registrations attributed to a node
    pub fn for_node(&self, node: &str) -> impl Iterator<Item = &IndexEntry> {
        self.by_node.get(&KeyRef(node)).into_iter().flatten()
    }

    /// Fail if `entry` is registered to a node other than `node`
    pub fn check(&self, entry: &IndexEntry, node: &Key) -> GraphResult<()> {
        match self.entries.get(entry) {
            Some(owner) if owner != node => Err(GraphError::IndexConflict {
                index: entry.name().to_string(),
                value: entry.value().to_string(),
                owner: owner.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Register an entry; callers must have run [`UniqueIndex::check`] first
    pub(crate) fn insert(&mut self, entry: IndexEntry, node: &Key) {
        self.by_node
            .entry(node.clone())
            .or_default()
            .insert(entry.clone());
        self.entries.insert(entry, node.clone());
    }

    pub(crate) fn remove(&mut self, entry: &IndexEntry, node: &Key) {
        if self.entries.get(entry) == Some(node) {
            self.entries.shift_remove(entry);
        }
        if let Some(owned) = self.by_node.get_mut(node) {
            owned.shift_remove(entry);
            if owned.is_empty() {
                self.by_node.shift_remove(node);
            }
        }
    }

    /// Retract every registration held by a node
    pub(crate) fn remove_node(&mut self, node: &Key) {
        if let Some(owned) = self.by_node.shift_remove(node) {
            for entry in owned {
                self.entries.shift_remove(&entry);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndexEntry, &Key)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_node.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_index_ops() {
        let mut index = UniqueIndex::new();
        let n1 = Key::new("node1");
        let n2 = Key::new("node2");
        let entry = IndexEntry::new("name", "marko");

        index.check(&entry, &n1).unwrap();
        index.insert(entry.clone(), &n1);
        assert_eq!(index.get("NAME", "marko"), Some(&n1));
        assert_eq!(index.for_node("node1").collect::<Vec<_>>(), vec![&entry]);

        // Same owner re-registering is fine, another owner conflicts
        index.check(&entry, &n1).unwrap();
        let err = index.check(&entry, &n2).unwrap_err();
        assert_eq!(
            err,
            GraphError::IndexConflict {
                index: "name".to_string(),
                value: "marko".to_string(),
                owner: "node1".to_string(),
            }
        );

        index.remove(&entry, &n1);
        assert!(index.is_empty());
        assert_eq!(index.for_node("node1").count(), 0);
    }

    #[test]
    fn test_remove_node() {
        let mut index = UniqueIndex::new();
        let n1 = Key::new("node1");
        index.insert(IndexEntry::new("name", "marko"), &n1);
        index.insert(IndexEntry::new("email", "m@x"), &n1);
        index.insert(IndexEntry::new("name", "vadas"), &Key::new("node2"));
        assert_eq!(index.len(), 3);

        index.remove_node(&n1);
        assert_eq!(index.len(), 1);
        assert!(index.get("name", "marko").is_none());
        assert!(index.get("name", "vadas").is_some());
    }

    #[test]
    fn test_entry_display() {
        assert_eq!(IndexEntry::new("lang", "java").to_string(), "lang=java");
    }
}
