//! JSON file snapshot store
//!
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a crash mid-write leaves the previous snapshot intact.

use async_trait::async_trait;
use paperdesk_engine::BookState;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Snapshot store backed by one JSON file
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn save(&self, state: &BookState) -> Result<(), StoreError> {
        let snapshot = Snapshot::new(state.clone());
        let bytes =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            positions = state.positions.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Deserialization(e.to_string()))?;
        snapshot.check_version()?;
        Ok(Some(snapshot))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
