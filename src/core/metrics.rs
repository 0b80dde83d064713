use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide quote counters, shared by every caller of one service.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    cache_hits: AtomicU64,
    stale_hits: AtomicU64,
    network_fetch: AtomicU64,
    network_fail: AtomicU64,
    last_fetch_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`RuntimeMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub cache_hits: u64,
    pub stale_hits: u64,
    pub network_fetch: u64,
    pub network_fail: u64,
    pub last_fetch_at: Option<DateTime<Utc>>,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_fetch(&self) {
        self.network_fetch.fetch_add(1, Ordering::Relaxed);
        let mut last = self
            .last_fetch_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(Utc::now());
    }

    pub fn record_network_fail(&self) {
        self.network_fail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RuntimeStats {
        let last_fetch_at = *self
            .last_fetch_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        RuntimeStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            network_fetch: self.network_fetch.load(Ordering::Relaxed),
            network_fail: self.network_fail.load(Ordering::Relaxed),
            last_fetch_at,
        }
    }
}
