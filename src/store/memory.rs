use crate::core::snapshot::{DailySnapshot, SnapshotStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Snapshot rows kept in process memory, keyed by `(scope, date)`.
#[derive(Default, Clone)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<BTreeMap<(String, NaiveDate), DailySnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn upsert(&self, snapshot: &DailySnapshot) -> Result<()> {
        let mut rows = self.inner.lock().await;
        let replaced = rows
            .insert((snapshot.scope.clone(), snapshot.date), snapshot.clone())
            .is_some();
        debug!(scope = %snapshot.scope, date = %snapshot.date, replaced, "Snapshot PUT");
        Ok(())
    }

    async fn list(&self, scope: &str) -> Result<Vec<DailySnapshot>> {
        let rows = self.inner.lock().await;
        Ok(rows
            .iter()
            .filter(|((row_scope, _), _)| row_scope == scope)
            .map(|(_, snapshot)| snapshot.clone())
            .collect())
    }

    async fn get(&self, scope: &str, date: NaiveDate) -> Result<Option<DailySnapshot>> {
        let rows = self.inner.lock().await;
        Ok(rows.get(&(scope.to_string(), date)).cloned())
    }
}
