//! Read-through cache in front of a blob store
//!
//! Reads populate a bounded LRU with a sliding expiration. Writes always go
//! to the backing store first: `set`/`add` then refresh the cached copy from
//! the confirmed result, `append`/`delete` drop it. A failed write leaves the
//! cache untouched, except a `Conflict` which also evicts the now-stale entry.

use super::blob::{Blob, BlobStore, ETag, LeaseId, WriteOptions};
use super::error::{StoreError, StoreResult};
use crate::config::CacheConfig;
use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cache effectiveness counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

struct CachedBlob {
    blob: Blob,
    expires_at: Instant,
}

/// [`BlobStore`] decorator caching reads for paths in scope
pub struct CachedBlobStore {
    inner: Arc<dyn BlobStore>,
    entries: Mutex<LruCache<String, CachedBlob>>,
    enabled: bool,
    ttl: Duration,
    path_prefix: Option<String>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl CachedBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>, config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            entries: Mutex::new(LruCache::new(capacity)),
            enabled: config.enabled,
            ttl: config.ttl(),
            path_prefix: config.path_prefix.clone(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<dyn BlobStore> {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Number of cached blobs, including ones past expiry not yet evicted
    pub fn cached_len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.entries.lock().contains(path)
    }

    fn in_scope(&self, path: &str) -> bool {
        self.enabled
            && self
                .path_prefix
                .as_deref()
                .map_or(true, |prefix| path.starts_with(prefix))
    }

    fn lookup(&self, path: &str) -> Option<Blob> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = match entries.get_mut(path) {
            Some(cached) if now < cached.expires_at => {
                cached.expires_at = now + self.ttl;
                return Some(cached.blob.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(path);
        }
        None
    }

    fn populate(&self, path: &str, blob: Blob) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .lock()
            .put(path.to_string(), CachedBlob { blob, expires_at });
        debug!("Cached {}", path);
    }

    fn invalidate(&self, path: &str) {
        if self.entries.lock().pop(path).is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!("Invalidated cached {}", path);
        }
    }
}

#[async_trait]
impl BlobStore for CachedBlobStore {
    async fn get(&self, path: &str) -> StoreResult<Blob> {
        if !self.in_scope(path) {
            return self.inner.get(path).await;
        }
        if let Some(blob) = self.lookup(path) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(blob);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let blob = self.inner.get(path).await?;
        self.populate(path, blob.clone());
        Ok(blob)
    }

    async fn set(&self, path: &str, data: Bytes, options: WriteOptions) -> StoreResult<ETag> {
        match self.inner.set(path, data.clone(), options).await {
            Ok(etag) => {
                if self.in_scope(path) {
                    self.populate(path, Blob::new(data, etag.clone()));
                }
                Ok(etag)
            }
            Err(err) => {
                if matches!(err, StoreError::Conflict(_)) {
                    self.invalidate(path);
                }
                Err(err)
            }
        }
    }

    async fn add(&self, path: &str, data: Bytes) -> StoreResult<ETag> {
        let etag = self.inner.add(path, data.clone()).await?;
        if self.in_scope(path) {
            self.populate(path, Blob::new(data, etag.clone()));
        }
        Ok(etag)
    }

    async fn append(&self, path: &str, data: Bytes) -> StoreResult<ETag> {
        let etag = self.inner.append(path, data).await?;
        self.invalidate(path);
        Ok(etag)
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.inner.delete(path).await?;
        self.invalidate(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        self.inner.exists(path).await
    }

    async fn acquire_lease(&self, path: &str, duration: Duration) -> StoreResult<LeaseId> {
        self.inner.acquire_lease(path, duration).await
    }

    async fn acquire_exclusive(&self, path: &str, break_if_held: bool) -> StoreResult<LeaseId> {
        self.inner.acquire_exclusive(path, break_if_held).await
    }

    async fn renew_lease(&self, path: &str, lease: &LeaseId) -> StoreResult<()> {
        self.inner.renew_lease(path, lease).await
    }

    async fn release_lease(&self, path: &str, lease: &LeaseId) -> StoreResult<()> {
        self.inner.release_lease(path, lease).await
    }

    async fn break_lease(&self, path: &str) -> StoreResult<()> {
        self.inner.break_lease(path).await
    }
}
