use super::{Persistence, Record};
use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// In-memory record store.
///
/// Uses DashMap for concurrent access. Values are kept as JSON so the
/// store behaves like the persistent backends (a record that fails to
/// serialize fails here too).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<String, serde_json::Value>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl<T: Record> Persistence<T> for InMemoryStore {
    async fn load(&self) -> Result<Option<T>> {
        match self.records.get(T::KEY) {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value().clone())?)),
            None => Ok(None),
        }
    }

    async fn save(&self, value: &T) -> Result<()> {
        trace!(target: "herald::storage", key = T::KEY, "Saving record in memory");
        let json = serde_json::to_value(value)?;
        self.records.insert(T::KEY.to_string(), json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::stats::UsageStats;

    #[tokio::test]
    async fn test_round_trip_per_key() {
        let store = InMemoryStore::new();
        let loaded: Option<Settings> = store.load().await.unwrap();
        assert!(loaded.is_none());

        let settings = Settings {
            language: "ja".into(),
            ..Settings::default()
        };
        store.save(&settings).await.unwrap();
        store.save(&UsageStats::default()).await.unwrap();

        let loaded: Option<Settings> = store.load().await.unwrap();
        assert_eq!(loaded, Some(settings));
        assert!(store.contains("settings"));
        assert!(store.contains("usage_stats"));
        assert_eq!(store.len(), 2);
    }
}
