//! Graph map store
//!
//! Owns the single in-memory [`GraphMap`] of a snapshot path and brackets all
//! access to it with a lease: acquire, load (or reuse), mutate, checkpoint
//! under an ETag precondition, release.
//!
//! In shared mode each logical operation takes its own time-boxed lease;
//! callers within one process queue in arrival order. In exclusive mode the
//! first acquire takes a non-expiring lease and later acquires reuse both the
//! lease and the loaded map.

use super::blob::{Blob, BlobLease, BlobStore, ETag, LeaseKind, WriteCondition};
use super::error::{StoreError, StoreResult};
use super::lease::{LeaseControl, LeaseGuard};
use super::metrics::LeaseMetrics;
use crate::config::GraphStoreConfig;
use crate::graph::{GraphMap, GraphSerialization};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct MapState {
    map: Option<GraphMap>,
    etag: Option<ETag>,
    /// Set when the stored snapshot is known to differ from `map`
    stale: bool,
    /// Set when `map` holds changes not yet checkpointed
    dirty: bool,
    last_used: Instant,
}

enum Snapshot {
    Present(Blob),
    Empty(ETag),
    Absent,
}

/// Lease-bracketed access to one persisted graph map
pub struct GraphMapStore {
    control: Arc<LeaseControl>,
    read_only: bool,
    /// FIFO queue of logical operations in shared mode
    operations: Arc<Semaphore>,
    /// Serializes snapshot reads and writes
    io: tokio::sync::Mutex<()>,
    state: Mutex<MapState>,
}

impl GraphMapStore {
    pub fn new(store: Arc<dyn BlobStore>, config: &GraphStoreConfig) -> Self {
        Self::with_control(LeaseControl::from_config(store, config), config.read_only)
    }

    pub fn with_control(control: LeaseControl, read_only: bool) -> Self {
        Self {
            control: Arc::new(control),
            read_only,
            operations: Arc::new(Semaphore::new(1)),
            io: tokio::sync::Mutex::new(()),
            state: Mutex::new(MapState {
                map: None,
                etag: None,
                stale: false,
                dirty: false,
                last_used: Instant::now(),
            }),
        }
    }

    pub fn path(&self) -> &str {
        self.control.path()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn lease_control(&self) -> &Arc<LeaseControl> {
        &self.control
    }

    pub fn metrics(&self) -> &Arc<LeaseMetrics> {
        self.control.metrics()
    }

    /// ETag of the snapshot the in-memory map was loaded from or last written as
    pub fn etag(&self) -> Option<ETag> {
        self.state.lock().etag.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().map.is_some()
    }

    /// Time since the last acquire or release
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.state.lock().last_used)
    }

    /// Acquire a lease and make the map current
    ///
    /// Under the exclusive lease an already loaded map is reused without
    /// touching storage. Otherwise the snapshot is read; an unchanged ETag
    /// keeps the loaded map, and an absent or empty snapshot is initialised
    /// with an empty graph.
    pub async fn acquire_lease(self: &Arc<Self>) -> StoreResult<MapLease> {
        let permit = if self.control.share_mode() {
            let permit = Arc::clone(&self.operations)
                .acquire_owned()
                .await
                .map_err(|_| StoreError::Backend("operation queue closed".to_string()))?;
            Some(permit)
        } else {
            None
        };

        let guard = self.control.acquire().await?;
        if let Err(err) = self.refresh(&guard).await {
            if matches!(err, StoreError::LeaseNotHeld { .. }) {
                self.lease_lost(guard.lease()).await;
            }
            if let Err(release_err) = guard.release().await {
                warn!("Failed to release lease on {}: {}", self.path(), release_err);
            }
            return Err(err);
        }
        self.touch();

        Ok(MapLease {
            store: Arc::clone(self),
            guard: Some(guard),
            permit,
        })
    }

    /// Re-read the snapshot under the held lease
    ///
    /// # Panics
    ///
    /// If no lease is held.
    pub async fn load_database(&self) -> StoreResult<()> {
        let Some(lease) = self.control.current_lease().await else {
            panic!("load of {} attempted without a held lease", self.path());
        };
        let _io = self.io.lock().await;
        self.load_from(&lease).await
    }

    /// Write the in-memory map back under the last-known ETag
    ///
    /// Fails with `Conflict` when the snapshot changed since it was loaded;
    /// the next acquire then reloads. A lease the store no longer recognises
    /// is dropped locally, so the next acquire takes a fresh one.
    ///
    /// # Panics
    ///
    /// If no lease is held.
    pub async fn checkpoint_map(&self) -> StoreResult<ETag> {
        if self.read_only {
            return Err(StoreError::ReadOnly(self.path().to_string()));
        }
        self.assert_held("checkpoint");

        let _io = self.io.lock().await;
        let (data, condition) = {
            let state = self.state.lock();
            let map = state
                .map
                .as_ref()
                .ok_or_else(|| StoreError::NotLoaded(self.path().to_string()))?;
            let condition = match &state.etag {
                Some(etag) => WriteCondition::IfMatch(etag.clone()),
                None => WriteCondition::IfNotExists,
            };
            (map.to_serialization().to_bytes()?, condition)
        };

        match self.control.write(Bytes::from(data), condition).await {
            Ok(etag) => {
                let mut state = self.state.lock();
                state.etag = Some(etag.clone());
                state.stale = false;
                state.dirty = false;
                debug!("Checkpointed {} at {}", self.path(), etag);
                Ok(etag)
            }
            Err(StoreError::Conflict(path)) => {
                warn!("Snapshot {} changed since it was loaded; reload and retry", path);
                self.state.lock().stale = true;
                Err(StoreError::Conflict(path))
            }
            Err(err @ StoreError::LeaseNotHeld { .. }) => {
                if let Some(lease) = self.control.current_lease().await {
                    self.lease_lost(&lease).await;
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Replace the whole in-memory map and checkpoint it
    ///
    /// # Panics
    ///
    /// If no lease is held.
    pub async fn set_map(&self, map: GraphMap) -> StoreResult<ETag> {
        if self.read_only {
            return Err(StoreError::ReadOnly(self.path().to_string()));
        }
        self.assert_held("map replacement");
        {
            let mut state = self.state.lock();
            state.map = Some(map);
            state.dirty = true;
        }
        self.checkpoint_map().await
    }

    /// Read the map under the held lease
    ///
    /// # Panics
    ///
    /// If no lease is held.
    pub fn with_map<R>(&self, f: impl FnOnce(&GraphMap) -> R) -> StoreResult<R> {
        self.assert_held("read");
        let state = self.state.lock();
        let map = state
            .map
            .as_ref()
            .ok_or_else(|| StoreError::NotLoaded(self.path().to_string()))?;
        Ok(f(map))
    }

    /// Mutate the map under the held lease; changes persist on checkpoint
    ///
    /// In shared mode changes that are never checkpointed are discarded by
    /// the next acquire.
    ///
    /// # Panics
    ///
    /// If no lease is held.
    pub fn with_map_mut<R>(&self, f: impl FnOnce(&mut GraphMap) -> R) -> StoreResult<R> {
        self.assert_held("mutation");
        let mut state = self.state.lock();
        let map = state
            .map
            .as_mut()
            .ok_or_else(|| StoreError::NotLoaded(self.path().to_string()))?;
        let result = f(map);
        state.dirty = true;
        Ok(result)
    }

    /// Copy of the current map
    pub fn map_reference(&self) -> StoreResult<GraphMap> {
        self.with_map(GraphMap::clone)
    }

    pub async fn release_lease(&self, lease: MapLease) -> StoreResult<()> {
        lease.release().await
    }

    /// Release the exclusive lease if held
    ///
    /// The loaded map is kept but treated as stale, so the next acquire
    /// reads the snapshot again.
    pub async fn release_exclusive(&self) -> StoreResult<()> {
        let result = self.control.release_exclusive().await;
        let mut state = self.state.lock();
        state.stale = true;
        state.last_used = Instant::now();
        result
    }

    async fn refresh(&self, guard: &LeaseGuard) -> StoreResult<()> {
        let _io = self.io.lock().await;
        if guard.kind() == LeaseKind::Exclusive {
            let state = self.state.lock();
            if state.map.is_some() && !state.stale {
                debug!("Reusing loaded map for {}", self.path());
                return Ok(());
            }
        }
        self.load_from(guard.lease()).await
    }

    async fn load_from(&self, lease: &BlobLease) -> StoreResult<()> {
        match self.read_snapshot(lease).await? {
            Snapshot::Present(blob) => self.install_blob(blob),
            Snapshot::Empty(etag) => self.initialize_or_reload(lease, Some(etag)).await,
            Snapshot::Absent => self.initialize_or_reload(lease, None).await,
        }
    }

    async fn read_snapshot(&self, lease: &BlobLease) -> StoreResult<Snapshot> {
        match lease.get().await {
            Ok(blob) if blob.is_empty() => Ok(Snapshot::Empty(blob.etag)),
            Ok(blob) => Ok(Snapshot::Present(blob)),
            Err(StoreError::NotFound(_)) => Ok(Snapshot::Absent),
            Err(err) => Err(err),
        }
    }

    fn install_blob(&self, blob: Blob) -> StoreResult<()> {
        {
            let state = self.state.lock();
            let unchanged = !state.stale && !state.dirty && state.etag.as_ref() == Some(&blob.etag);
            if state.map.is_some() && unchanged {
                debug!("Snapshot {} unchanged at {}", self.path(), blob.etag);
                return Ok(());
            }
        }

        let serialization = GraphSerialization::from_bytes(&blob.data)?;
        let map = GraphMap::from_serialization(serialization)?;
        info!(
            "Loaded snapshot {} at {} ({} nodes, {} edges)",
            self.path(),
            blob.etag,
            map.node_count(),
            map.edge_count()
        );
        self.install(map, Some(blob.etag));
        Ok(())
    }

    async fn initialize_or_reload(&self, lease: &BlobLease, existing: Option<ETag>) -> StoreResult<()> {
        match self.initialize(existing).await {
            Err(StoreError::AlreadyExists(_)) | Err(StoreError::Conflict(_)) => {
                info!("Snapshot {} was initialised concurrently; reloading", self.path());
                match self.read_snapshot(lease).await? {
                    Snapshot::Present(blob) => self.install_blob(blob),
                    _ => Err(StoreError::Conflict(self.path().to_string())),
                }
            }
            other => other,
        }
    }

    async fn initialize(&self, existing: Option<ETag>) -> StoreResult<()> {
        let map = GraphMap::new();
        if self.read_only {
            debug!("Snapshot {} is empty; read-only store starts blank", self.path());
            self.install(map, existing);
            return Ok(());
        }

        let data = map.to_serialization().to_bytes()?;
        let condition = match existing {
            Some(etag) => WriteCondition::IfMatch(etag),
            None => WriteCondition::IfNotExists,
        };
        let etag = self.control.write(Bytes::from(data), condition).await?;
        info!("Initialised empty snapshot {} at {}", self.path(), etag);
        self.install(map, Some(etag));
        Ok(())
    }

    fn install(&self, map: GraphMap, etag: Option<ETag>) {
        let mut state = self.state.lock();
        state.map = Some(map);
        state.etag = etag;
        state.stale = false;
        state.dirty = false;
    }

    /// The store reported our lease as not held: it was broken or expired
    async fn lease_lost(&self, lease: &BlobLease) {
        if lease.kind() == LeaseKind::Exclusive {
            self.control.forget_exclusive(lease.id()).await;
        }
        self.state.lock().stale = true;
    }

    fn touch(&self) {
        self.state.lock().last_used = Instant::now();
    }

    fn assert_held(&self, operation: &str) {
        if !self.control.is_held() {
            panic!(
                "{} of {} attempted without a held lease",
                operation,
                self.path()
            );
        }
    }
}

/// One logical operation's hold on a [`GraphMapStore`]
///
/// Releasing (or dropping) it releases a scoped lease and lets the next
/// queued operation proceed. Under the exclusive lease release is a no-op.
#[must_use = "dropping a map lease releases it"]
pub struct MapLease {
    store: Arc<GraphMapStore>,
    guard: Option<LeaseGuard>,
    permit: Option<OwnedSemaphorePermit>,
}

impl MapLease {
    pub fn store(&self) -> &Arc<GraphMapStore> {
        &self.store
    }

    pub fn kind(&self) -> Option<LeaseKind> {
        self.guard.as_ref().map(LeaseGuard::kind)
    }

    pub fn with_map<R>(&self, f: impl FnOnce(&GraphMap) -> R) -> StoreResult<R> {
        self.store.with_map(f)
    }

    pub fn with_map_mut<R>(&self, f: impl FnOnce(&mut GraphMap) -> R) -> StoreResult<R> {
        self.store.with_map_mut(f)
    }

    pub async fn checkpoint(&self) -> StoreResult<ETag> {
        self.store.checkpoint_map().await
    }

    pub async fn set_map(&self, map: GraphMap) -> StoreResult<ETag> {
        self.store.set_map(map).await
    }

    pub async fn release(mut self) -> StoreResult<()> {
        let result = match self.guard.take() {
            Some(guard) => guard.release().await,
            None => Ok(()),
        };
        self.permit.take();
        self.store.touch();
        result
    }
}

impl Drop for MapLease {
    fn drop(&mut self) {
        let permit = self.permit.take();
        let Some(guard) = self.guard.take() else {
            return;
        };
        if !guard.is_scoped() {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                let path = self.store.path().to_string();
                // The next queued operation starts only after the release lands
                handle.spawn(async move {
                    if let Err(err) = guard.release().await {
                        warn!("Failed to release lease on {}: {}", path, err);
                    }
                    drop(permit);
                });
            }
            Err(_) => drop(guard),
        }
    }
}

impl std::fmt::Debug for MapLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapLease")
            .field("path", &self.store.path())
            .field("guard", &self.guard)
            .finish()
    }
}
