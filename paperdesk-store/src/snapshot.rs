//! Snapshot trait and the persisted envelope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperdesk_engine::BookState;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Current on-disk format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A saved book with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: BookState,
}

impl Snapshot {
    pub fn new(state: BookState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            state,
        }
    }

    pub(crate) fn check_version(&self) -> Result<(), StoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(())
    }
}

/// Persistence port for the book.
///
/// Only the latest snapshot is kept. Validating the loaded state against the
/// ledger invariants is the caller's job (`Book::from_state`).
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot
    async fn save(&self, state: &BookState) -> Result<(), StoreError>;

    /// Load the stored snapshot, if any
    async fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Remove the stored snapshot
    async fn clear(&self) -> Result<(), StoreError>;
}
