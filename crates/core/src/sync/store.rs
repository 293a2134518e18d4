//! Task and history storage.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use thiserror::Error;

use super::{HistoryEntry, SyncStatus, SyncTask};

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Filter for querying tasks.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Filter by owner.
    pub user_id: Option<String>,
    /// Filter by status.
    pub status: Option<SyncStatus>,
    /// Maximum number of results.
    pub limit: usize,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            user_id: None,
            status: None,
            limit: 100,
        }
    }

    /// Filter by owner.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Filter by status.
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, task: &SyncTask) -> bool {
        self.user_id.as_ref().is_none_or(|u| *u == task.user_id)
            && self.status.is_none_or(|s| s == task.status)
    }
}

/// Trait for task storage backends.
pub trait SyncStore: Send + Sync {
    /// Insert or replace a task snapshot.
    fn put_task(&self, task: &SyncTask) -> Result<(), StoreError>;

    /// Get a task by ID.
    fn get_task(&self, id: &str) -> Result<Option<SyncTask>, StoreError>;

    /// List tasks matching the filter, newest first.
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<SyncTask>, StoreError>;

    /// Append a history entry, keeping only the `retention` most recently
    /// appended entries for that user.
    fn append_history(&self, entry: &HistoryEntry, retention: usize) -> Result<(), StoreError>;

    /// A user's history, newest `created_at` first, at most `limit` entries.
    fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>;
}

/// In-memory store, for tests and runs without a database.
#[derive(Default)]
pub struct MemorySyncStore {
    tasks: RwLock<HashMap<String, SyncTask>>,
    history: RwLock<HashMap<String, VecDeque<HistoryEntry>>>,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncStore for MemorySyncStore {
    fn put_task(&self, task: &SyncTask) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().map_err(|_| StoreError::Poisoned)?;
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn get_task(&self, id: &str) -> Result<Option<SyncTask>, StoreError> {
        let tasks = self.tasks.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tasks.get(id).cloned())
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<SyncTask>, StoreError> {
        let tasks = self.tasks.read().map_err(|_| StoreError::Poisoned)?;
        let mut matching: Vec<SyncTask> = tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(filter.limit);
        Ok(matching)
    }

    fn append_history(&self, entry: &HistoryEntry, retention: usize) -> Result<(), StoreError> {
        let mut history = self.history.write().map_err(|_| StoreError::Poisoned)?;
        let entries = history.entry(entry.user_id.clone()).or_default();
        entries.push_back(entry.clone());
        while entries.len() > retention {
            entries.pop_front();
        }
        Ok(())
    }

    fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let history = self.history.read().map_err(|_| StoreError::Poisoned)?;
        let Some(entries) = history.get(user_id) else {
            return Ok(Vec::new());
        };

        // Newest appended first so equal timestamps keep append order reversed.
        let mut listed: Vec<HistoryEntry> = entries.iter().rev().cloned().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit);
        Ok(listed)
    }
}
