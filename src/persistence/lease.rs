//! Lease control over the graph snapshot path
//!
//! Two modes, fixed per controller:
//! - exclusive: one non-expiring lease held across many operations and
//!   released explicitly; acquiring again while held is a no-op
//! - shared: one time-boxed lease per logical operation, released when the
//!   returned guard is released or dropped
//!
//! Every transition goes through a single async mutex, so one process has at
//! most one acquire or release in flight. Protocol violations (a second
//! scoped lease, releasing nothing, exclusive retries exhausted) panic.

use super::blob::{BlobLease, BlobStore, ETag, LeaseId, LeaseKind, WriteCondition};
use super::error::{StoreError, StoreResult};
use super::metrics::LeaseMetrics;
use crate::config::GraphStoreConfig;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Attempts made to take the exclusive lease; the last one breaks a foreign lease
pub const EXCLUSIVE_ACQUIRE_ATTEMPTS: usize = 2;

#[derive(Default)]
struct LeaseState {
    exclusive: Option<BlobLease>,
    scoped: Option<BlobLease>,
}

impl LeaseState {
    fn current(&self) -> Option<&BlobLease> {
        self.exclusive.as_ref().or(self.scoped.as_ref())
    }
}

/// Lease state machine for one snapshot path
pub struct LeaseControl {
    store: Arc<dyn BlobStore>,
    path: String,
    share_mode: bool,
    lease_duration: Duration,
    gate: Mutex<LeaseState>,
    held: AtomicBool,
    metrics: Arc<LeaseMetrics>,
}

impl LeaseControl {
    pub fn new(
        store: Arc<dyn BlobStore>,
        path: impl Into<String>,
        share_mode: bool,
        lease_duration: Duration,
    ) -> Self {
        Self {
            store,
            path: path.into(),
            share_mode,
            lease_duration,
            gate: Mutex::new(LeaseState::default()),
            held: AtomicBool::new(false),
            metrics: Arc::new(LeaseMetrics::new()),
        }
    }

    pub fn from_config(store: Arc<dyn BlobStore>, config: &GraphStoreConfig) -> Self {
        Self::new(
            store,
            config.snapshot_path.clone(),
            config.share_mode,
            config.lease_duration(),
        )
    }

    /// Report into a shared metrics instance
    pub fn with_metrics(mut self, metrics: Arc<LeaseMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn share_mode(&self) -> bool {
        self.share_mode
    }

    pub fn metrics(&self) -> &Arc<LeaseMetrics> {
        &self.metrics
    }

    /// Whether any lease (exclusive or scoped) is currently held
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub async fn current_lease(&self) -> Option<BlobLease> {
        self.gate.lock().await.current().cloned()
    }

    /// Acquire according to the configured mode
    pub async fn acquire(self: &Arc<Self>) -> StoreResult<LeaseGuard> {
        if self.share_mode {
            self.acquire_scoped().await
        } else {
            self.acquire_exclusive().await
        }
    }

    /// Take (or reuse) the non-expiring exclusive lease
    ///
    /// A `Locked` answer is retried once with `break_if_held`, which clears a
    /// lease this process left behind in an earlier run. Any other store
    /// error is returned unchanged.
    pub async fn acquire_exclusive(&self) -> StoreResult<LeaseGuard> {
        let mut state = self.gate.lock().await;
        if let Some(lease) = &state.exclusive {
            debug!("Exclusive lease on {} already held", self.path);
            return Ok(LeaseGuard::borrowed(lease.clone()));
        }

        for attempt in 0..EXCLUSIVE_ACQUIRE_ATTEMPTS {
            let break_if_held = attempt > 0;
            match self.store.acquire_exclusive(&self.path, break_if_held).await {
                Ok(id) => {
                    let lease = BlobLease::new(
                        Arc::clone(&self.store),
                        self.path.clone(),
                        id,
                        LeaseKind::Exclusive,
                    );
                    state.exclusive = Some(lease.clone());
                    self.sync_held(&state);
                    self.metrics.exclusive_acquired();
                    info!("Acquired exclusive lease {} on {}", lease.id(), self.path);
                    return Ok(LeaseGuard::borrowed(lease));
                }
                Err(StoreError::Locked(_)) => {
                    self.metrics.exclusive_retry();
                    warn!(
                        "Snapshot {} is locked (attempt {}/{})",
                        self.path,
                        attempt + 1,
                        EXCLUSIVE_ACQUIRE_ATTEMPTS
                    );
                }
                Err(err) => return Err(err),
            }
        }

        panic!(
            "exclusive lease on {} could not be acquired after {} attempts",
            self.path, EXCLUSIVE_ACQUIRE_ATTEMPTS
        );
    }

    async fn acquire_scoped(self: &Arc<Self>) -> StoreResult<LeaseGuard> {
        let mut state = self.gate.lock().await;
        if let Some(lease) = &state.exclusive {
            debug!("Scoped acquire on {} served by exclusive lease", self.path);
            return Ok(LeaseGuard::borrowed(lease.clone()));
        }
        if let Some(held) = &state.scoped {
            panic!(
                "scoped lease {} on {} is already held by this process",
                held.id(),
                self.path
            );
        }

        let id = self.store.acquire_lease(&self.path, self.lease_duration).await?;
        let lease = BlobLease::new(Arc::clone(&self.store), self.path.clone(), id, LeaseKind::Scoped);
        state.scoped = Some(lease.clone());
        self.sync_held(&state);
        self.metrics.scoped_acquired();
        debug!("Acquired scoped lease {} on {}", lease.id(), self.path);
        Ok(LeaseGuard::scoped(lease, Arc::clone(self)))
    }

    /// Release the scoped lease
    ///
    /// # Panics
    ///
    /// If no scoped lease is held.
    pub async fn release(&self) -> StoreResult<()> {
        self.release_scoped(None).await
    }

    async fn release_scoped(&self, expected: Option<&LeaseId>) -> StoreResult<()> {
        let mut state = self.gate.lock().await;
        match (&state.scoped, expected) {
            (None, _) => panic!("release on {} with no scoped lease held", self.path),
            (Some(held), Some(id)) if held.id() != id => panic!(
                "release of lease {} on {} while lease {} is held",
                id,
                self.path,
                held.id()
            ),
            _ => {}
        }
        let Some(lease) = self.take_scoped(&mut state) else {
            return Ok(());
        };
        debug!("Releasing scoped lease {} on {}", lease.id(), self.path);
        lease.release().await
    }

    /// Release the exclusive lease if held; a no-op otherwise
    pub async fn release_exclusive(&self) -> StoreResult<()> {
        let mut state = self.gate.lock().await;
        let Some(lease) = state.exclusive.take() else {
            return Ok(());
        };
        self.sync_held(&state);
        self.metrics.exclusive_released();
        info!("Releasing exclusive lease {} on {}", lease.id(), self.path);
        lease.release().await
    }

    /// Drop a lost exclusive lease from local state without calling the store
    ///
    /// Used once the store has reported the lease as not held (it was broken
    /// by another process), so the next acquire goes back to the store.
    pub async fn forget_exclusive(&self, id: &LeaseId) -> bool {
        let mut state = self.gate.lock().await;
        if state.exclusive.as_ref().map_or(true, |held| held.id() != id) {
            return false;
        }
        state.exclusive = None;
        self.sync_held(&state);
        self.metrics.exclusive_released();
        warn!("Exclusive lease {} on {} was lost", id, self.path);
        true
    }

    /// Write the snapshot under whichever lease is held
    ///
    /// # Panics
    ///
    /// If no lease is held.
    pub async fn write(&self, data: Bytes, condition: WriteCondition) -> StoreResult<ETag> {
        let state = self.gate.lock().await;
        let Some(lease) = state.current() else {
            panic!("write to {} attempted without a held lease", self.path);
        };
        lease.set(data, condition).await
    }

    fn take_scoped(&self, state: &mut LeaseState) -> Option<BlobLease> {
        let lease = state.scoped.take()?;
        self.sync_held(state);
        self.metrics.scoped_released();
        Some(lease)
    }

    fn take_scoped_if(&self, state: &mut LeaseState, id: &LeaseId) -> Option<BlobLease> {
        let matches = state.scoped.as_ref().map_or(false, |held| held.id() == id);
        if matches {
            self.take_scoped(state)
        } else {
            None
        }
    }

    fn sync_held(&self, state: &LeaseState) {
        self.held.store(state.current().is_some(), Ordering::Release);
    }

    /// Release a scoped lease from a synchronous context
    fn release_detached(self: Arc<Self>, id: LeaseId) {
        // Clear local state now if the gate is free, so an immediate
        // re-acquire does not see the dropped lease
        let taken = self
            .gate
            .try_lock()
            .ok()
            .map(|mut state| self.take_scoped_if(&mut state, &id));

        let Ok(handle) = Handle::try_current() else {
            warn!(
                "No runtime to release lease {} on {}; it will expire",
                id, self.path
            );
            return;
        };
        handle.spawn(async move {
            let lease = match taken {
                Some(lease) => lease,
                None => {
                    let mut state = self.gate.lock().await;
                    self.take_scoped_if(&mut state, &id)
                }
            };
            if let Some(lease) = lease {
                if let Err(err) = lease.release().await {
                    warn!("Failed to release lease {} on {}: {}", id, self.path, err);
                }
            }
        });
    }
}

impl Drop for LeaseControl {
    fn drop(&mut self) {
        let state = self.gate.get_mut();
        let leases: Vec<BlobLease> = state.exclusive.take().into_iter().chain(state.scoped.take()).collect();
        if leases.is_empty() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!("No runtime to release leases on {}", self.path);
            return;
        };
        for lease in leases {
            debug!("Releasing lease {} on {} at shutdown", lease.id(), self.path);
            let path = self.path.clone();
            handle.spawn(async move {
                if let Err(err) = lease.release().await {
                    warn!("Failed to release lease {} on {} at shutdown: {}", lease.id(), path, err);
                }
            });
        }
    }
}

/// Handle returned by [`LeaseControl::acquire`]
///
/// For a scoped lease, releasing (or dropping) the guard releases the lease.
/// Guards over the exclusive lease are no-ops on release.
#[must_use = "dropping a scoped guard releases its lease"]
pub struct LeaseGuard {
    lease: BlobLease,
    control: Option<Arc<LeaseControl>>,
}

impl LeaseGuard {
    fn borrowed(lease: BlobLease) -> Self {
        Self { lease, control: None }
    }

    fn scoped(lease: BlobLease, control: Arc<LeaseControl>) -> Self {
        Self {
            lease,
            control: Some(control),
        }
    }

    pub fn lease(&self) -> &BlobLease {
        &self.lease
    }

    pub fn kind(&self) -> LeaseKind {
        self.lease.kind()
    }

    /// Whether releasing this guard releases a lease
    pub fn is_scoped(&self) -> bool {
        self.control.is_some()
    }

    pub async fn release(mut self) -> StoreResult<()> {
        match self.control.take() {
            Some(control) => control.release_scoped(Some(self.lease.id())).await,
            None => Ok(()),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            control.release_detached(self.lease.id().clone());
        }
    }
}

impl std::fmt::Debug for LeaseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("lease", &self.lease)
            .field("scoped", &self.is_scoped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{Blob, MemoryBlobStore, WriteOptions};
    use async_trait::async_trait;

    const PATH: &str = "graph/directory.json";

    fn control(store: &Arc<MemoryBlobStore>, share_mode: bool) -> Arc<LeaseControl> {
        Arc::new(LeaseControl::new(
            store.clone(),
            PATH,
            share_mode,
            Duration::from_secs(60),
        ))
    }

    async fn wait_until_unleased(store: &MemoryBlobStore) {
        for _ in 0..16 {
            if !store.is_leased(PATH) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Store that reports every path as locked
    struct AlwaysLocked;

    #[async_trait]
    impl BlobStore for AlwaysLocked {
        async fn get(&self, path: &str) -> StoreResult<Blob> {
            Err(StoreError::NotFound(path.to_string()))
        }
        async fn set(&self, path: &str, _: Bytes, _: WriteOptions) -> StoreResult<ETag> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn add(&self, path: &str, _: Bytes) -> StoreResult<ETag> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn append(&self, path: &str, _: Bytes) -> StoreResult<ETag> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn delete(&self, path: &str) -> StoreResult<()> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn exists(&self, _: &str) -> StoreResult<bool> {
            Ok(false)
        }
        async fn acquire_lease(&self, path: &str, _: Duration) -> StoreResult<LeaseId> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn acquire_exclusive(&self, path: &str, _: bool) -> StoreResult<LeaseId> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn renew_lease(&self, path: &str, _: &LeaseId) -> StoreResult<()> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn release_lease(&self, path: &str, _: &LeaseId) -> StoreResult<()> {
            Err(StoreError::Locked(path.to_string()))
        }
        async fn break_lease(&self, _: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_exclusive_is_reentrant() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, false);

        let first = control.acquire().await.unwrap();
        let second = control.acquire().await.unwrap();
        assert_eq!(first.lease().id(), second.lease().id());
        assert!(!first.is_scoped());
        assert!(control.is_held());

        // Releasing an exclusive guard does not release the lease
        first.release().await.unwrap();
        assert!(store.is_leased(PATH));
        assert_eq!(control.metrics().snapshot().exclusive_acquired, 1);
    }

    #[tokio::test]
    async fn test_exclusive_retry_breaks_stale_lease() {
        let store = Arc::new(MemoryBlobStore::new());
        let stale = store.acquire_exclusive(PATH, false).await.unwrap();

        let control = control(&store, false);
        let guard = control.acquire().await.unwrap();
        assert_ne!(guard.lease().id(), &stale);

        let snapshot = control.metrics().snapshot();
        assert_eq!(snapshot.exclusive_retries, 1);
        assert_eq!(snapshot.active_exclusive, 1);
    }

    #[tokio::test]
    #[should_panic(expected = "could not be acquired after 2 attempts")]
    async fn test_exclusive_retries_exhausted() {
        let control = Arc::new(LeaseControl::new(
            Arc::new(AlwaysLocked),
            PATH,
            false,
            Duration::from_secs(60),
        ));
        let _ = control.acquire().await;
    }

    #[tokio::test]
    async fn test_other_errors_pass_through() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = Arc::new(LeaseControl::new(store, "", false, Duration::from_secs(60)));
        assert!(matches!(
            control.acquire().await,
            Err(StoreError::InvalidPath(_))
        ));
        assert!(!control.is_held());
    }

    #[tokio::test]
    async fn test_forget_broken_exclusive() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, false);
        let guard = control.acquire().await.unwrap();
        let lost = guard.lease().id().clone();

        store.break_lease(PATH).await.unwrap();
        assert!(!control.forget_exclusive(&LeaseId::new("other")).await);
        assert!(control.is_held());
        assert!(control.forget_exclusive(&lost).await);
        assert!(!control.is_held());
        assert_eq!(control.metrics().snapshot().active_exclusive, 0);

        let guard = control.acquire().await.unwrap();
        assert_ne!(guard.lease().id(), &lost);
        assert_eq!(control.metrics().snapshot().exclusive_retries, 0);
    }

    #[tokio::test]
    async fn test_drop_releases_held_lease() {
        let store = Arc::new(MemoryBlobStore::new());
        let first = control(&store, false);
        first.acquire().await.unwrap().release().await.unwrap();
        drop(first);
        wait_until_unleased(&store).await;
        assert!(!store.is_leased(PATH));

        // A lease broken underneath us fails to release and is only logged
        let second = control(&store, false);
        second.acquire().await.unwrap().release().await.unwrap();
        store.break_lease(PATH).await.unwrap();
        drop(second);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        store.acquire_exclusive(PATH, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_exclusive_is_idempotent() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, false);
        control.release_exclusive().await.unwrap();

        let _guard = control.acquire().await.unwrap();
        control.release_exclusive().await.unwrap();
        control.release_exclusive().await.unwrap();
        assert!(!store.is_leased(PATH));
        assert!(!control.is_held());

        let snapshot = control.metrics().snapshot();
        assert_eq!(snapshot.exclusive_released, 1);
        assert_eq!(snapshot.active_exclusive, 0);
    }

    #[tokio::test]
    async fn test_scoped_acquire_and_release() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, true);

        let guard = control.acquire().await.unwrap();
        assert!(guard.is_scoped());
        assert_eq!(guard.kind(), LeaseKind::Scoped);
        assert!(store.is_leased(PATH));

        guard.release().await.unwrap();
        assert!(!store.is_leased(PATH));
        assert!(!control.is_held());

        let snapshot = control.metrics().snapshot();
        assert_eq!(snapshot.scoped_acquired, 1);
        assert_eq!(snapshot.scoped_released, 1);
        assert_eq!(snapshot.active_scoped, 0);
    }

    #[tokio::test]
    async fn test_dropped_guard_releases() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, true);

        {
            let _guard = control.acquire().await.unwrap();
        }
        assert!(!control.is_held());
        wait_until_unleased(&store).await;
        assert!(!store.is_leased(PATH));

        // Immediately reusable
        let guard = control.acquire().await.unwrap();
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_scoped_degrades_to_exclusive() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, true);

        let exclusive = control.acquire_exclusive().await.unwrap();
        let scoped = control.acquire().await.unwrap();
        assert!(!scoped.is_scoped());
        assert_eq!(scoped.lease().id(), exclusive.lease().id());
        scoped.release().await.unwrap();
        assert!(store.is_leased(PATH));
        assert_eq!(control.metrics().snapshot().scoped_acquired, 0);
    }

    #[tokio::test]
    async fn test_scoped_locked_elsewhere() {
        let store = Arc::new(MemoryBlobStore::new());
        store.acquire_exclusive(PATH, false).await.unwrap();
        let control = control(&store, true);
        assert!(matches!(control.acquire().await, Err(StoreError::Locked(_))));
        assert!(!control.is_held());
    }

    #[tokio::test]
    #[should_panic(expected = "already held by this process")]
    async fn test_double_scoped_acquire_panics() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, true);
        let _first = control.acquire().await.unwrap();
        let _second = control.acquire().await;
    }

    #[tokio::test]
    #[should_panic(expected = "no scoped lease held")]
    async fn test_release_without_lease_panics() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, true);
        let _ = control.release().await;
    }

    #[tokio::test]
    async fn test_write_under_lease() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, true);
        let guard = control.acquire().await.unwrap();
        let etag = control
            .write(Bytes::from_static(b"{}"), WriteCondition::IfNotExists)
            .await
            .unwrap();
        assert_eq!(store.get(PATH).await.unwrap().etag, etag);
        guard.release().await.unwrap();
    }

    #[tokio::test]
    #[should_panic(expected = "without a held lease")]
    async fn test_write_without_lease_panics() {
        let store = Arc::new(MemoryBlobStore::new());
        let control = control(&store, false);
        let _ = control.write(Bytes::from_static(b"{}"), WriteCondition::None).await;
    }
}
