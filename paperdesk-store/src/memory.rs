//! In-memory snapshot store
//!
//! Used for testing and for daemons started without a snapshot path.

use async_trait::async_trait;
use paperdesk_engine::BookState;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::snapshot::{Snapshot, SnapshotStore};

/// In-memory snapshot store
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: RwLock<Option<Snapshot>>,
    saves: RwLock<u64>,
}

impl MemorySnapshotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> u64 {
        *self.saves.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, state: &BookState) -> Result<(), StoreError> {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(Snapshot::new(state.clone()));
        *self.saves.write().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
