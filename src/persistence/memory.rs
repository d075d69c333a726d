//! In-process blob store
//!
//! Reference [`BlobStore`] backend: blobs and leases live in a single map
//! behind a mutex. ETag preconditions are evaluated before the lease check,
//! so a stale write reports `Conflict` even when its lease is also gone.

use super::blob::{Blob, BlobStore, ETag, LeaseId, WriteCondition, WriteOptions};
use super::error::{StoreError, StoreResult};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct ActiveLease {
    id: LeaseId,
    /// `None` for exclusive leases
    duration: Option<Duration>,
    expires_at: Option<Instant>,
}

impl ActiveLease {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Debug, Default)]
struct Entry {
    blob: Option<Blob>,
    lease: Option<ActiveLease>,
}

impl Entry {
    fn live_lease(&self, now: Instant) -> Option<&ActiveLease> {
        self.lease.as_ref().filter(|lease| lease.is_live(now))
    }

    fn is_vacant(&self) -> bool {
        self.blob.is_none() && self.lease.is_none()
    }

    fn check_lease(&self, path: &str, lease: Option<&LeaseId>, now: Instant) -> StoreResult<()> {
        match (self.live_lease(now), lease) {
            (None, None) => Ok(()),
            (Some(active), Some(id)) if &active.id == id => Ok(()),
            (Some(_), None) => Err(StoreError::Locked(path.to_string())),
            (_, Some(id)) => Err(StoreError::LeaseNotHeld {
                path: path.to_string(),
                lease: id.to_string(),
            }),
        }
    }

    fn check_write(&self, path: &str, options: &WriteOptions, now: Instant) -> StoreResult<()> {
        match &options.condition {
            WriteCondition::None => {}
            WriteCondition::IfMatch(etag) => match &self.blob {
                Some(blob) if &blob.etag == etag => {}
                _ => return Err(StoreError::Conflict(path.to_string())),
            },
            WriteCondition::IfNotExists => {
                if self.blob.is_some() {
                    return Err(StoreError::AlreadyExists(path.to_string()));
                }
            }
        }
        self.check_lease(path, options.lease.as_ref(), now)
    }

    fn store(&mut self, data: Bytes) -> ETag {
        let etag = ETag::generate();
        self.blob = Some(Blob {
            data,
            etag: etag.clone(),
        });
        etag
    }
}

/// Blob store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently holding a blob
    pub fn paths(&self) -> Vec<String> {
        let entries = self.entries.lock();
        let mut paths: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.blob.is_some())
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Whether a live lease is active on `path`
    pub fn is_leased(&self, path: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(path)
            .map_or(false, |entry| entry.live_lease(now).is_some())
    }

    fn validate(path: &str) -> StoreResult<()> {
        if path.trim().is_empty() || path.ends_with('/') {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, path: &str) -> StoreResult<Blob> {
        Self::validate(path)?;
        self.entries
            .lock()
            .get(path)
            .and_then(|entry| entry.blob.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn set(&self, path: &str, data: Bytes, options: WriteOptions) -> StoreResult<ETag> {
        Self::validate(path)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.entry(path.to_string()).or_default();
        if let Err(err) = entry.check_write(path, &options, now) {
            if entry.is_vacant() {
                entries.remove(path);
            }
            return Err(err);
        }
        Ok(entry.store(data))
    }

    async fn add(&self, path: &str, data: Bytes) -> StoreResult<ETag> {
        self.set(path, data, WriteOptions::if_not_exists()).await
    }

    async fn append(&self, path: &str, data: Bytes) -> StoreResult<ETag> {
        Self::validate(path)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.entry(path.to_string()).or_default();
        entry.check_lease(path, None, now)?;

        let combined = match entry.blob.take() {
            Some(existing) => {
                let mut buf = BytesMut::with_capacity(existing.data.len() + data.len());
                buf.extend_from_slice(&existing.data);
                buf.extend_from_slice(&data);
                buf.freeze()
            }
            None => data,
        };
        Ok(entry.store(combined))
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        Self::validate(path)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(path)
            .filter(|entry| entry.blob.is_some())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        entry.check_lease(path, None, now)?;
        entry.blob = None;
        if entry.is_vacant() {
            entries.remove(path);
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Self::validate(path)?;
        Ok(self
            .entries
            .lock()
            .get(path)
            .map_or(false, |entry| entry.blob.is_some()))
    }

    async fn acquire_lease(&self, path: &str, duration: Duration) -> StoreResult<LeaseId> {
        Self::validate(path)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.entry(path.to_string()).or_default();
        if entry.live_lease(now).is_some() {
            return Err(StoreError::Locked(path.to_string()));
        }
        let id = LeaseId::generate();
        entry.lease = Some(ActiveLease {
            id: id.clone(),
            duration: Some(duration),
            expires_at: Some(now + duration),
        });
        debug!("Lease {} taken on {} for {:?}", id, path, duration);
        Ok(id)
    }

    async fn acquire_exclusive(&self, path: &str, break_if_held: bool) -> StoreResult<LeaseId> {
        Self::validate(path)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries.entry(path.to_string()).or_default();
        if let Some(active) = entry.live_lease(now) {
            if !break_if_held {
                return Err(StoreError::Locked(path.to_string()));
            }
            debug!("Breaking lease {} on {}", active.id, path);
        }
        let id = LeaseId::generate();
        entry.lease = Some(ActiveLease {
            id: id.clone(),
            duration: None,
            expires_at: None,
        });
        debug!("Exclusive lease {} taken on {}", id, path);
        Ok(id)
    }

    async fn renew_lease(&self, path: &str, lease: &LeaseId) -> StoreResult<()> {
        Self::validate(path)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let active = entries
            .get_mut(path)
            .and_then(|entry| entry.lease.as_mut())
            .filter(|active| &active.id == lease && active.is_live(now))
            .ok_or_else(|| StoreError::LeaseNotHeld {
                path: path.to_string(),
                lease: lease.to_string(),
            })?;
        if let Some(duration) = active.duration {
            active.expires_at = Some(now + duration);
        }
        Ok(())
    }

    async fn release_lease(&self, path: &str, lease: &LeaseId) -> StoreResult<()> {
        Self::validate(path)?;
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(path)
            .filter(|entry| entry.lease.as_ref().map_or(false, |active| &active.id == lease))
            .ok_or_else(|| StoreError::LeaseNotHeld {
                path: path.to_string(),
                lease: lease.to_string(),
            })?;
        entry.lease = None;
        if entry.is_vacant() {
            entries.remove(path);
        }
        debug!("Lease {} released on {}", lease, path);
        Ok(())
    }

    async fn break_lease(&self, path: &str) -> StoreResult<()> {
        Self::validate(path)?;
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(path) {
            entry.lease = None;
            if entry.is_vacant() {
                entries.remove(path);
            }
        }
        Ok(())
    }
}
