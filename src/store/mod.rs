//! Storage behind the account and snapshot interfaces.

pub mod accounts;
pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::snapshot::SnapshotStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

pub use accounts::{ALL_SCOPE, ConfigAccountStore};
pub use disk::DiskSnapshotStore;
pub use memory::MemorySnapshotStore;

/// The persistent store under the configured data directory. When it cannot
/// be opened, snapshots are kept in memory for this run only.
pub fn open_snapshot_store(config: &AppConfig) -> Result<Arc<dyn SnapshotStore>> {
    let path = config.default_data_path()?;
    match DiskSnapshotStore::open(&path) {
        Ok(store) => {
            debug!("Using snapshot store at {}", path.display());
            Ok(Arc::new(store))
        }
        Err(e) => {
            warn!("Snapshot store unavailable ({e:#}), keeping snapshots in memory");
            Ok(Arc::new(MemorySnapshotStore::new()))
        }
    }
}
