use crate::core::snapshot::{DailySnapshot, SnapshotStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "daily_snapshots";

/// Snapshot rows in a fjall partition. Keys are `scope \0 YYYY-MM-DD`, so a
/// prefix scan over one scope yields its rows in date order. Values are
/// JSON.
pub struct DiskSnapshotStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

fn scope_prefix(scope: &str) -> String {
    format!("{scope}\0")
}

fn snapshot_key(scope: &str, date: NaiveDate) -> String {
    format!("{}{}", scope_prefix(scope), date.format("%Y-%m-%d"))
}

impl DiskSnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;
        let keyspace = fjall::Config::new(path.join("snapshots"))
            .open()
            .with_context(|| format!("Failed to open snapshot store in {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open snapshot partition")?;
        Ok(Self {
            keyspace,
            partition,
        })
    }
}

#[async_trait]
impl SnapshotStore for DiskSnapshotStore {
    async fn upsert(&self, snapshot: &DailySnapshot) -> Result<()> {
        let key = snapshot_key(&snapshot.scope, snapshot.date);
        self.partition
            .insert(key.as_bytes(), serde_json::to_vec(snapshot)?)
            .with_context(|| format!("Failed to write snapshot {}", key.replace('\0', "/")))?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(scope = %snapshot.scope, date = %snapshot.date, "Snapshot PUT");
        Ok(())
    }

    async fn list(&self, scope: &str) -> Result<Vec<DailySnapshot>> {
        self.partition
            .prefix(scope_prefix(scope))
            .map(|item| {
                let (_, value) = item?;
                serde_json::from_slice::<DailySnapshot>(&value)
                    .context("Failed to decode stored snapshot")
            })
            .collect()
    }

    async fn get(&self, scope: &str, date: NaiveDate) -> Result<Option<DailySnapshot>> {
        match self.partition.get(snapshot_key(scope, date))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }
}
