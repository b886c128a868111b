//! Persistent RocksDB-backed record store.

use super::{Persistence, Record};
use crate::{HeraldError, Result};
use async_trait::async_trait;
use rocksdb::{Options, DB};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Each record is one key in the default column family, JSON-encoded.
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db =
            DB::open(&opts, path).map_err(|e| HeraldError::PersistenceError(e.to_string()))?;

        info!(target: "herald::storage", "RocksDbStore initialized");
        Ok(Arc::new(Self { db }))
    }
}

#[async_trait]
impl<T: Record> Persistence<T> for RocksDbStore {
    async fn load(&self) -> Result<Option<T>> {
        match self.db.get(T::KEY) {
            Ok(Some(data)) => Ok(Some(serde_json::from_slice(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(HeraldError::PersistenceError(e.to_string())),
        }
    }

    async fn save(&self, value: &T) -> Result<()> {
        let serialized = serde_json::to_vec(value)?;
        self.db
            .put(T::KEY, serialized)
            .map_err(|e| HeraldError::PersistenceError(e.to_string()))
    }
}
