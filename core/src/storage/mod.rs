//! Persistence seam for settings and usage counters.
//!
//! Records are plain serde values stored under a fixed key:
//! - `InMemoryStore` - process-local, default and tests
//! - `JsonFileStore` - one JSON file per record
//! - `RocksDbStore` - RocksDB, behind the `rocksdb` feature
//!
//! The scheduler treats every failure here as non-fatal.

mod file;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksDbStore;

use crate::settings::Settings;
use crate::stats::UsageStats;
use crate::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A value persisted under a fixed key.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KEY: &'static str;
}

impl Record for Settings {
    const KEY: &'static str = "settings";
}

impl Record for UsageStats {
    const KEY: &'static str = "usage_stats";
}

/// Load/save interface for one record type.
#[async_trait]
pub trait Persistence<T: Record>: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<T>>;

    async fn save(&self, value: &T) -> Result<()>;
}
