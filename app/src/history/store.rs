use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;
use tokio::sync::RwLock;

use super::{HistoryRecord, PgHistoryStore};
use crate::core::time::TimeWindow;

/// Persistence of history records and small settings documents.
pub trait HistoryStore: Send + Sync + 'static {
    /// Appends all records of one logging cycle, all or nothing.
    fn append(&self, records: &[HistoryRecord]) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Records of `metric` inside `window`, ordered by time. With a limit,
    /// only the newest `limit` records are returned, still in time order.
    fn query(
        &self,
        metric: &str,
        window: TimeWindow,
        limit: Option<usize>,
    ) -> impl Future<Output = anyhow::Result<Vec<HistoryRecord>>> + Send;

    fn get_setting(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<Value>>> + Send;

    fn put_setting(&self, key: &str, value: Value) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Volatile store used when no database is configured.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<HistoryRecord>>,
    settings: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryStore {
    async fn append(&self, records: &[HistoryRecord]) -> anyhow::Result<()> {
        self.records.write().await.extend_from_slice(records);
        Ok(())
    }

    async fn query(
        &self,
        metric: &str,
        window: TimeWindow,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        let mut matching: Vec<HistoryRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.metric == metric && window.contains(&r.timestamp))
            .cloned()
            .collect();

        matching.sort_by_key(|r| r.timestamp);

        if let Some(limit) = limit {
            let skip = matching.len().saturating_sub(limit);
            matching.drain(..skip);
        }

        Ok(matching)
    }

    async fn get_setting(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.settings.read().await.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.settings.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Store selected at startup.
pub enum HistoryBackend {
    Memory(InMemoryStore),
    Postgres(PgHistoryStore),
}

impl HistoryStore for HistoryBackend {
    async fn append(&self, records: &[HistoryRecord]) -> anyhow::Result<()> {
        match self {
            HistoryBackend::Memory(store) => store.append(records).await,
            HistoryBackend::Postgres(store) => store.append(records).await,
        }
    }

    async fn query(
        &self,
        metric: &str,
        window: TimeWindow,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        match self {
            HistoryBackend::Memory(store) => store.query(metric, window, limit).await,
            HistoryBackend::Postgres(store) => store.query(metric, window, limit).await,
        }
    }

    async fn get_setting(&self, key: &str) -> anyhow::Result<Option<Value>> {
        match self {
            HistoryBackend::Memory(store) => store.get_setting(key).await,
            HistoryBackend::Postgres(store) => store.get_setting(key).await,
        }
    }

    async fn put_setting(&self, key: &str, value: Value) -> anyhow::Result<()> {
        match self {
            HistoryBackend::Memory(store) => store.put_setting(key, value).await,
            HistoryBackend::Postgres(store) => store.put_setting(key, value).await,
        }
    }
}
