//! Per-resource graph map stores
//!
//! One [`GraphMapStore`] per resource id, created on first use and evicted
//! once idle. Stores share the backing blob store and one lease metrics
//! instance.

use super::blob::BlobStore;
use super::lease::LeaseControl;
use super::map_store::GraphMapStore;
use super::metrics::LeaseMetrics;
use crate::config::GraphStoreConfig;
use crate::graph::Key;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct MapStoreRegistry {
    blobs: Arc<dyn BlobStore>,
    config: GraphStoreConfig,
    metrics: Arc<LeaseMetrics>,
    stores: Mutex<HashMap<Key, Arc<GraphMapStore>>>,
}

impl MapStoreRegistry {
    pub fn new(blobs: Arc<dyn BlobStore>, config: GraphStoreConfig) -> Self {
        Self {
            blobs,
            config,
            metrics: Arc::new(LeaseMetrics::new()),
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<LeaseMetrics> {
        &self.metrics
    }

    /// Snapshot path for a resource: its id as a `.json` blob next to the
    /// configured snapshot path
    pub fn snapshot_path_for(&self, resource_id: &str) -> String {
        match self.config.snapshot_path.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}.json", dir, resource_id),
            None => format!("{}.json", resource_id),
        }
    }

    /// The store for `resource_id` (case-insensitive), creating it on first use
    pub fn get_or_create(&self, resource_id: &str) -> Arc<GraphMapStore> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&Key::from(resource_id)) {
            return Arc::clone(store);
        }

        let path = self.snapshot_path_for(resource_id);
        let config = GraphStoreConfig {
            snapshot_path: path.clone(),
            ..self.config.clone()
        };
        let control = LeaseControl::from_config(Arc::clone(&self.blobs), &config)
            .with_metrics(Arc::clone(&self.metrics));
        let store = Arc::new(GraphMapStore::with_control(control, config.read_only));
        stores.insert(Key::from(resource_id), Arc::clone(&store));
        info!("Created graph map store for {} at {}", resource_id, path);
        store
    }

    pub fn get(&self, resource_id: &str) -> Option<Arc<GraphMapStore>> {
        self.stores.lock().get(&Key::from(resource_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.lock().is_empty()
    }

    pub fn resource_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stores.lock().keys().map(Key::to_string).collect();
        ids.sort();
        ids
    }

    /// Drop stores idle for at least `max_idle` that nobody else references,
    /// releasing their exclusive leases. Returns the evicted resource ids.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<String> {
        let evicted: Vec<(Key, Arc<GraphMapStore>)> = {
            let mut stores = self.stores.lock();
            let idle: Vec<Key> = stores
                .iter()
                .filter(|(_, store)| Arc::strong_count(store) == 1 && store.idle_for() >= max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            idle.into_iter()
                .filter_map(|id| stores.remove(&id).map(|store| (id, store)))
                .collect()
        };

        let mut ids = Vec::with_capacity(evicted.len());
        for (id, store) in evicted {
            if let Err(err) = store.release_exclusive().await {
                warn!("Failed to release lease for evicted store {}: {}", id, err);
            }
            info!("Evicted idle graph map store {}", id);
            ids.push(id.to_string());
        }
        ids
    }
}
