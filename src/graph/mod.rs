//! Core graph map implementation
//!
//! This module implements the node/edge data model with:
//! - Nodes keyed case-insensitively, carrying ordered tags and unique-index declarations
//! - Directed edges keyed by `(from, to, edge type)`
//! - Tag and unique indexes maintained synchronously on every mutation
//! - A fluent read-only search surface and a canonical serialized form

pub mod collection;
pub mod edge;
pub mod error;
pub mod map;
pub mod node;
pub mod search;
pub mod serialization;
pub mod tags;
pub mod types;

// Re-export main types
pub use collection::{EdgeCollection, NodeCollection};
pub use edge::{GraphEdge, DEFAULT_EDGE_TYPE};
pub use error::{GraphError, GraphResult};
pub use map::{GraphMap, GraphStatistics};
pub use node::GraphNode;
pub use search::{Search, SearchResult};
pub use serialization::GraphSerialization;
pub use tags::{parse_indexes, parse_tags, IndexDirective, IndexNames, TagDirective, Tags};
pub use types::{EdgeKey, Key};
