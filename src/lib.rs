//! Samyama Graph Map
//!
//! An embedded property-graph store with tag and unique-value indexes,
//! persisted as a single snapshot blob under lease and ETag control.
//!
//! # Architecture
//!
//! - `graph`: nodes and edges with a compact tag/index mini-language, the
//!   index maintainer (tag index plus unique index), the `GraphMap`
//!   aggregate, fluent search and the canonical serialized form. All of it
//!   is synchronous and CPU-only.
//! - `persistence`: the blob store abstraction, an in-memory backend, the
//!   read-through cache adapter, lease control (exclusive or scoped), and
//!   the `GraphMapStore` that brackets graph access with a lease.
//! - `config`: YAML-loadable store and cache configuration.
//!
//! ## Example Usage
//!
//! ```rust
//! use graphmap::graph::{GraphMap, GraphNode};
//!
//! let mut map = GraphMap::new();
//! map.add_node(GraphNode::parse("node1", "name=marko,age=29", "name").unwrap())
//!     .unwrap();
//!
//! // Carry tags forward, drop `age`
//! map.set_node(GraphNode::new("node1").with_tags("-age").unwrap())
//!     .unwrap();
//!
//! assert_eq!(map.nodes().lookup_index("name", "marko").unwrap(), "node1");
//! assert!(map.nodes().lookup_tag("age").is_empty());
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod persistence;

// Re-export main types for convenience
pub use config::{CacheConfig, ConfigError, ConfigResult, GraphStoreConfig};
pub use error::ErrorKind;
pub use graph::{
    EdgeKey, GraphEdge, GraphError, GraphMap, GraphNode, GraphResult, GraphSerialization,
    GraphStatistics, Key, Search, SearchResult, Tags,
};
pub use index::{IndexEntry, TagIndex, UniqueIndex};
pub use persistence::{
    BlobStore, CachedBlobStore, ETag, GraphMapStore, LeaseControl, LeaseMetrics, MapLease,
    MapStoreRegistry, MemoryBlobStore, StoreError, StoreResult,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
