//! Core type definitions for the graph map

use indexmap::Equivalent;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Case-insensitive, case-preserving identifier
///
/// Used for node keys, tag names, index names and edge types. Equality,
/// hashing and ordering fold ASCII case; the original spelling is kept for
/// display and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(value: impl Into<String>) -> Self {
        Key(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive comparison against a borrowed string
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

fn hash_folded<H: Hasher>(value: &str, state: &mut H) {
    for byte in value.bytes() {
        state.write_u8(byte.to_ascii_lowercase());
    }
    state.write_u8(0xff);
}

fn cmp_folded(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_folded(&self.0, state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_folded(&self.0, &other.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.to_string())
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

/// Borrowed lookup form of [`Key`], hashing identically so maps keyed by
/// `Key` can be probed with a `&str` without allocating
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyRef<'a>(pub &'a str);

impl Hash for KeyRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_folded(self.0, state);
    }
}

impl Equivalent<Key> for KeyRef<'_> {
    fn equivalent(&self, key: &Key) -> bool {
        key.matches(self.0)
    }
}

/// Primary key of an edge: `(from, to, edge type)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: Key,
    pub to: Key,
    pub edge_type: Key,
}

impl EdgeKey {
    pub fn new(from: impl Into<Key>, to: impl Into<Key>, edge_type: impl Into<Key>) -> Self {
        EdgeKey {
            from: from.into(),
            to: to.into(),
            edge_type: edge_type.into(),
        }
    }

    /// Whether either endpoint is the given node
    pub fn touches(&self, node: &str) -> bool {
        self.from.matches(node) || self.to.matches(node)
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}[{}]", self.from, self.to, self.edge_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::collections::HashSet;

    #[test]
    fn test_key_case_insensitive() {
        let a = Key::new("Node1");
        let b = Key::new("node1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Node1");
        assert_eq!(format!("{}", a), "Node1");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_key_ref_lookup() {
        let mut map = IndexMap::new();
        map.insert(Key::new("Lang"), 1);
        assert_eq!(map.get(&KeyRef("LANG")), Some(&1));
        assert_eq!(map.get(&KeyRef("name")), None);
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![Key::new("b"), Key::new("A"), Key::new("c")];
        keys.sort();
        let names: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["A", "b", "c"]);
    }

    #[test]
    fn test_edge_key() {
        let key = EdgeKey::new("node1", "node2", "knows");
        assert_eq!(key, EdgeKey::new("NODE1", "node2", "Knows"));
        assert_ne!(key, EdgeKey::new("node1", "node2", "created"));
        assert!(key.touches("node2"));
        assert!(!key.touches("node3"));
        assert_eq!(format!("{}", key), "node1->node2[knows]");
    }
}
