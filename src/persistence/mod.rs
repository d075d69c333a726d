//! Persistence layer for the graph map
//!
//! - `blob`: path-keyed, versioned, leasable blob store abstraction
//! - `memory`: in-process blob store backend
//! - `cache`: read-through cache adapter over any blob store
//! - `lease`: exclusive and scoped lease control over a snapshot path
//! - `map_store`: lease-bracketed load / checkpoint of a graph map
//! - `registry`: one map store per resource id

pub mod blob;
pub mod cache;
pub mod error;
pub mod lease;
pub mod map_store;
pub mod memory;
pub mod metrics;
pub mod registry;

pub use blob::{Blob, BlobLease, BlobStore, ETag, LeaseId, LeaseKind, WriteCondition, WriteOptions};
pub use cache::{CacheStats, CachedBlobStore};
pub use error::{StoreError, StoreResult};
pub use lease::{LeaseControl, LeaseGuard, EXCLUSIVE_ACQUIRE_ATTEMPTS};
pub use map_store::{GraphMapStore, MapLease};
pub use memory::MemoryBlobStore;
pub use metrics::{LeaseMetrics, LeaseMetricsSnapshot};
pub use registry::MapStoreRegistry;
