//! Playlist sync tasks.
//!
//! [`SyncOrchestrator::start_sync`] persists a `pending` [`SyncTask`] and
//! hands it to a [`SyncWorkerPool`]; callers poll
//! [`SyncOrchestrator::get_status`] until the task reaches `completed`,
//! `partial` or `failed`, after which a [`HistoryEntry`] is available from
//! [`SyncOrchestrator::get_history`].

mod config;
mod orchestrator;
mod sqlite_store;
mod store;
mod types;
mod worker;

pub use config::OrchestratorConfig;
pub use orchestrator::SyncOrchestrator;
pub use sqlite_store::SqliteSyncStore;
pub use store::{MemorySyncStore, StoreError, SyncStore, TaskFilter};
pub use types::{
    progress_at, HistoryEntry, SyncRequest, SyncStatus, SyncTask, TrackResultStatus,
    TrackSyncResult, NO_TRACKS_SYNCED,
};
pub use worker::{PoolStatus, SyncWorkerPool, WORKER_PANIC_MESSAGE};

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync task not found: {0}")]
    TaskNotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Task-level catalog failure; displays as the catalog error itself.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Sync queue is closed")]
    QueueClosed,

    #[error("Invalid sync request: {0}")]
    Validation(String),
}
