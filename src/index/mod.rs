//! Secondary indexes over the graph map
//!
//! Provides the multi-value tag index (nodes and edges) and the
//! uniqueness-constrained value index (nodes only). Both are derived data:
//! never persisted, rebuilt on load and maintained by the collections in
//! `graph::collection`.

pub mod tag_index;
pub mod unique_index;

pub use tag_index::TagIndex;
pub use unique_index::{IndexEntry, UniqueIndex};
