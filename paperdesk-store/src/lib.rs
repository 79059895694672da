//! Paperdesk Storage Layer
//!
//! Persists the book (ledger, open positions, trade statistics) between runs.
//!
//! # Architecture
//!
//! - **SnapshotStore trait**: The storage interface (port)
//! - **In-memory store**: Fast implementation for testing
//! - **JSON file store**: Single-file snapshot with atomic replace

#![warn(clippy::all)]

// Modules
mod error;
mod file;
mod memory;
mod snapshot;

// Re-exports
pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemorySnapshotStore;
pub use snapshot::{Snapshot, SnapshotStore, SNAPSHOT_VERSION};
