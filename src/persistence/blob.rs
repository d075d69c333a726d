//! Path-keyed blob store abstraction
//!
//! A blob store holds opaque byte payloads by path. Every write produces a
//! fresh ETag, which later writes may use as a compare-and-swap precondition.
//! Paths can be leased: a time-boxed lease for one logical operation, or a
//! non-expiring exclusive lease held until explicitly released. While a lease
//! is active, writes must present its id.

use super::error::StoreResult;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Opaque version token of a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random version token
    pub fn generate() -> Self {
        Self(format!("\"{}\"", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token identifying an active lease
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseId(String);

impl LeaseId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored payload together with its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub etag: ETag,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>, etag: ETag) -> Self {
        Self {
            data: data.into(),
            etag,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Precondition attached to a write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WriteCondition {
    /// Unconditional write
    #[default]
    None,
    /// Only if the stored blob still carries this ETag
    IfMatch(ETag),
    /// Only if no blob exists at the path
    IfNotExists,
}

/// Options for [`BlobStore::set`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub condition: WriteCondition,
    /// Lease to present when the path is leased
    pub lease: Option<LeaseId>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_match(etag: ETag) -> Self {
        Self {
            condition: WriteCondition::IfMatch(etag),
            lease: None,
        }
    }

    pub fn if_not_exists() -> Self {
        Self {
            condition: WriteCondition::IfNotExists,
            lease: None,
        }
    }

    pub fn with_lease(mut self, lease: LeaseId) -> Self {
        self.lease = Some(lease);
        self
    }
}

/// Path-keyed, versioned, leasable byte storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob; `NotFound` if absent
    async fn get(&self, path: &str) -> StoreResult<Blob>;

    /// Write a blob, honouring the condition and lease in `options`
    async fn set(&self, path: &str, data: Bytes, options: WriteOptions) -> StoreResult<ETag>;

    /// Create a blob; `AlreadyExists` if one is present
    async fn add(&self, path: &str, data: Bytes) -> StoreResult<ETag>;

    /// Append to a blob, creating it if absent
    async fn append(&self, path: &str, data: Bytes) -> StoreResult<ETag>;

    async fn delete(&self, path: &str) -> StoreResult<()>;

    async fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Take a time-boxed lease; `Locked` while another lease is active
    async fn acquire_lease(&self, path: &str, duration: Duration) -> StoreResult<LeaseId>;

    /// Take a non-expiring lease, optionally breaking an active one
    async fn acquire_exclusive(&self, path: &str, break_if_held: bool) -> StoreResult<LeaseId>;

    /// Extend a time-boxed lease by its original duration
    async fn renew_lease(&self, path: &str, lease: &LeaseId) -> StoreResult<()>;

    async fn release_lease(&self, path: &str, lease: &LeaseId) -> StoreResult<()>;

    /// Drop whatever lease is active on the path
    async fn break_lease(&self, path: &str) -> StoreResult<()>;
}

/// Kind of lease behind a [`BlobLease`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseKind {
    /// Time-boxed, one logical operation
    Scoped,
    /// Non-expiring, explicitly released
    Exclusive,
}

/// Handle to an acquired lease, scoping reads and writes to its token
#[derive(Clone)]
pub struct BlobLease {
    store: Arc<dyn BlobStore>,
    path: String,
    id: LeaseId,
    kind: LeaseKind,
}

impl BlobLease {
    pub fn new(store: Arc<dyn BlobStore>, path: impl Into<String>, id: LeaseId, kind: LeaseKind) -> Self {
        Self {
            store,
            path: path.into(),
            id,
            kind,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> &LeaseId {
        &self.id
    }

    pub fn kind(&self) -> LeaseKind {
        self.kind
    }

    pub async fn get(&self) -> StoreResult<Blob> {
        self.store.get(&self.path).await
    }

    /// Write under this lease
    pub async fn set(&self, data: Bytes, condition: WriteCondition) -> StoreResult<ETag> {
        let options = WriteOptions {
            condition,
            lease: Some(self.id.clone()),
        };
        self.store.set(&self.path, data, options).await
    }

    pub async fn renew(&self) -> StoreResult<()> {
        self.store.renew_lease(&self.path, &self.id).await
    }

    pub async fn release(&self) -> StoreResult<()> {
        self.store.release_lease(&self.path, &self.id).await
    }
}

impl fmt::Debug for BlobLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobLease")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
