//! Multi-value tag index: tag name -> owners carrying that tag

use crate::graph::types::{Key, KeyRef};
use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;

/// Index for tag presence, regardless of value
#[derive(Debug, Clone)]
pub struct TagIndex<K> {
    index: IndexMap<Key, IndexSet<K>>,
}

impl<K: Hash + Eq + Clone> TagIndex<K> {
    pub fn new() -> Self {
        Self {
            index: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, tag: &Key, owner: &K) {
        if let Some(owners) = self.index.get_mut(tag) {
            if !owners.contains(owner) {
                owners.insert(owner.clone());
            }
            return;
        }
        let mut owners = IndexSet::new();
        owners.insert(owner.clone());
        self.index.insert(tag.clone(), owners);
    }

    pub fn remove(&mut self, tag: &Key, owner: &K) {
        if let Some(owners) = self.index.get_mut(tag) {
            owners.shift_remove(owner);
            if owners.is_empty() {
                self.index.shift_remove(tag);
            }
        }
    }

    /// Owners carrying `tag`, in insertion order
    pub fn get(&self, tag: &str) -> impl Iterator<Item = &K> {
        self.index.get(&KeyRef(tag)).into_iter().flatten()
    }

    pub fn contains(&self, tag: &str, owner: &K) -> bool {
        self.index
            .get(&KeyRef(tag))
            .map_or(false, |owners| owners.contains(owner))
    }

    /// Number of distinct tags indexed
    pub fn tag_count(&self) -> usize {
        self.index.len()
    }

    pub fn tags(&self) -> impl Iterator<Item = &Key> {
        self.index.keys()
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }
}

impl<K: Hash + Eq + Clone> Default for TagIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}
