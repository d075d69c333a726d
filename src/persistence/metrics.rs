//! Lease transition counters
//!
//! Observability only; nothing in the lease protocol reads these back.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`LeaseMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseMetricsSnapshot {
    pub exclusive_acquired: u64,
    pub exclusive_released: u64,
    /// Exclusive attempts that found the snapshot locked
    pub exclusive_retries: u64,
    pub scoped_acquired: u64,
    pub scoped_released: u64,
    pub active_exclusive: u64,
    pub active_scoped: u64,
}

/// Atomic counters and gauges for one lease controller
#[derive(Debug, Default)]
pub struct LeaseMetrics {
    exclusive_acquired: AtomicU64,
    exclusive_released: AtomicU64,
    exclusive_retries: AtomicU64,
    scoped_acquired: AtomicU64,
    scoped_released: AtomicU64,
    active_exclusive: AtomicU64,
    active_scoped: AtomicU64,
}

impl LeaseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn exclusive_acquired(&self) {
        self.exclusive_acquired.fetch_add(1, Ordering::Relaxed);
        self.active_exclusive.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exclusive_released(&self) {
        self.exclusive_released.fetch_add(1, Ordering::Relaxed);
        decrement(&self.active_exclusive);
    }

    pub(crate) fn exclusive_retry(&self) {
        self.exclusive_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scoped_acquired(&self) {
        self.scoped_acquired.fetch_add(1, Ordering::Relaxed);
        self.active_scoped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scoped_released(&self) {
        self.scoped_released.fetch_add(1, Ordering::Relaxed);
        decrement(&self.active_scoped);
    }

    pub fn snapshot(&self) -> LeaseMetricsSnapshot {
        LeaseMetricsSnapshot {
            exclusive_acquired: self.exclusive_acquired.load(Ordering::Relaxed),
            exclusive_released: self.exclusive_released.load(Ordering::Relaxed),
            exclusive_retries: self.exclusive_retries.load(Ordering::Relaxed),
            scoped_acquired: self.scoped_acquired.load(Ordering::Relaxed),
            scoped_released: self.scoped_released.load(Ordering::Relaxed),
            active_exclusive: self.active_exclusive.load(Ordering::Relaxed),
            active_scoped: self.active_scoped.load(Ordering::Relaxed),
        }
    }
}

fn decrement(gauge: &AtomicU64) {
    let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
}
