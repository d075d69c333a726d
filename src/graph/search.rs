//! Fluent read-only queries over a graph map
//!
//! Every step returns a fresh [`SearchResult`] borrowing the map; nothing is
//! mutated and no cursor is kept between calls.

use super::edge::GraphEdge;
use super::map::GraphMap;
use super::node::GraphNode;
use super::types::EdgeKey;
use indexmap::IndexSet;

/// Entry point returned by [`GraphMap::search`]
#[derive(Debug, Clone, Copy)]
pub struct Search<'a> {
    map: &'a GraphMap,
}

impl<'a> Search<'a> {
    pub(crate) fn new(map: &'a GraphMap) -> Self {
        Self { map }
    }

    /// Seed with every node matching `predicate`
    pub fn nodes<P>(&self, predicate: P) -> SearchResult<'a>
    where
        P: Fn(&GraphNode) -> bool,
    {
        SearchResult {
            map: self.map,
            nodes: self.map.nodes().iter().filter(|&n| predicate(n)).collect(),
            edges: Vec::new(),
        }
    }

    pub fn all_nodes(&self) -> SearchResult<'a> {
        self.nodes(|_| true)
    }

    /// Seed with a single node by key (empty result if absent)
    pub fn node(&self, key: &str) -> SearchResult<'a> {
        SearchResult {
            map: self.map,
            nodes: self.map.nodes().get(key).into_iter().collect(),
            edges: Vec::new(),
        }
    }

    /// Seed with every edge matching `predicate`
    pub fn edges<P>(&self, predicate: P) -> SearchResult<'a>
    where
        P: Fn(&GraphEdge) -> bool,
    {
        SearchResult {
            map: self.map,
            nodes: Vec::new(),
            edges: self.map.edges().iter().filter(|&e| predicate(e)).collect(),
        }
    }

    pub fn all_edges(&self) -> SearchResult<'a> {
        self.edges(|_| true)
    }
}

/// Immutable `{nodes, edges}` bundle produced by a search step
#[derive(Debug, Clone)]
pub struct SearchResult<'a> {
    map: &'a GraphMap,
    nodes: Vec<&'a GraphNode>,
    edges: Vec<&'a GraphEdge>,
}

impl<'a> SearchResult<'a> {
    pub fn nodes(&self) -> &[&'a GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[&'a GraphEdge] {
        &self.edges
    }

    pub fn node_keys(&self) -> Vec<&'a str> {
        self.nodes.iter().map(|n| n.key().as_str()).collect()
    }

    pub fn edge_keys(&self) -> Vec<EdgeKey> {
        self.edges.iter().map(|e| e.key()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Keep the nodes with at least one outgoing edge matching `predicate`;
    /// the matching edges become the result's edges
    pub fn has_edge<P>(&self, predicate: P) -> SearchResult<'a>
    where
        P: Fn(&GraphEdge) -> bool,
    {
        let mut nodes = Vec::new();
        let mut edges: IndexSet<EdgeKey> = IndexSet::new();
        let mut matched = Vec::new();

        for node in &self.nodes {
            let hits: Vec<&'a GraphEdge> = self
                .map
                .edges()
                .edges_from(node.key().as_str())
                .into_iter()
                .filter(|&e| predicate(e))
                .collect();
            if hits.is_empty() {
                continue;
            }
            nodes.push(*node);
            for edge in hits {
                if edges.insert(edge.key()) {
                    matched.push(edge);
                }
            }
        }

        SearchResult {
            map: self.map,
            nodes,
            edges: matched,
        }
    }

    /// Follow the current edges to their target nodes, keeping the edges
    /// whose target matches `predicate`; the matching targets become the
    /// result's nodes
    pub fn has_node<P>(&self, predicate: P) -> SearchResult<'a>
    where
        P: Fn(&GraphNode) -> bool,
    {
        let mut nodes: Vec<&'a GraphNode> = Vec::new();
        let mut seen: IndexSet<&str> = IndexSet::new();
        let mut edges = Vec::new();

        for edge in &self.edges {
            let Some(target) = self.map.nodes().get(edge.to_key().as_str()) else {
                continue;
            };
            if !predicate(target) {
                continue;
            }
            edges.push(*edge);
            if seen.insert(target.key().as_str()) {
                nodes.push(target);
            }
        }

        SearchResult {
            map: self.map,
            nodes,
            edges,
        }
    }

    /// Narrow the current nodes by a further predicate, keeping edges
    pub fn filter_nodes<P>(&self, predicate: P) -> SearchResult<'a>
    where
        P: Fn(&GraphNode) -> bool,
    {
        SearchResult {
            map: self.map,
            nodes: self.nodes.iter().copied().filter(|&n| predicate(n)).collect(),
            edges: self.edges.clone(),
        }
    }
}
