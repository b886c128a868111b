use super::{Persistence, Record};
use crate::{HeraldError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stores each record as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// The directory is created lazily on the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!(target: "herald::storage", dir = %dir.display(), "JsonFileStore initialized");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl<T: Record> Persistence<T> for JsonFileStore {
    async fn load(&self) -> Result<Option<T>> {
        let path = self.path_for(T::KEY);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)?;
                debug!(target: "herald::storage", path = %path.display(), "Loaded record");
                Ok(Some(value))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HeraldError::PersistenceError(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn save(&self, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(T::KEY);
        let tmp = self.path_for(&format!("{}.tmp", T::KEY));
        let bytes = serde_json::to_vec_pretty(value)?;
        // Write-then-rename keeps the previous file intact on a failed write.
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(target: "herald::storage", path = %path.display(), "Saved record");
        Ok(())
    }
}
