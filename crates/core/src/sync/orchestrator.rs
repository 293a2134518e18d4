//! Sync orchestrator.
//!
//! Drives one task through `pending -> in_progress -> terminal`:
//! fetch the source playlist and tracks, provision the destination
//! playlist, resolve each track in order, append the matches, then record
//! the outcome in history. Per-track failures never abort the task; anything
//! failing outside the track loop fails the task with its message.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogError, DestinationCatalog, Playlist, SourceCatalog, Track};
use crate::metrics;
use crate::resolver::{ResolverConfig, TrackResolver};

use super::config::OrchestratorConfig;
use super::store::{SyncStore, TaskFilter};
use super::types::progress_at;
use super::worker::{PoolStatus, SyncJob, SyncWorkerPool};
use super::{HistoryEntry, SyncError, SyncRequest, SyncStatus, SyncTask, TrackSyncResult};

/// Executes sync jobs. Shared by every worker.
pub(crate) struct SyncEngine {
    source: Arc<dyn SourceCatalog>,
    destination: Arc<dyn DestinationCatalog>,
    resolver: TrackResolver,
    store: Arc<dyn SyncStore>,
    config: OrchestratorConfig,
}

impl SyncEngine {
    /// Run a job to a terminal status.
    ///
    /// Snapshots are persisted at each phase change, whenever the progress
    /// percentage moves, and at the terminal transition.
    pub(crate) async fn run(&self, job: SyncJob) -> SyncStatus {
        let SyncJob { mut task, request } = job;
        let started = Instant::now();

        task.start();
        self.save(&mut task);
        info!(
            "Task {}: syncing {} playlist {} to {}",
            task.id,
            self.source.name(),
            request.source_playlist_id,
            self.destination.name()
        );

        if let Err(e) = self.execute(&mut task, &request).await {
            error!("Task {}: sync failed: {}", task.id, e);
            task.fail(e.to_string());
        }

        self.complete(&mut task, started.elapsed());
        task.status
    }

    async fn execute(&self, task: &mut SyncTask, request: &SyncRequest) -> Result<(), SyncError> {
        let playlist_id = request.source_playlist_id.as_str();
        let source_credential = request.source_credential.as_str();
        let destination_credential = Some(request.destination_credential.as_str());

        let playlists = self.source.list_playlists(source_credential).await?;
        task.source_playlist = match playlists.into_iter().find(|p| p.id == playlist_id) {
            Some(playlist) => playlist,
            None => {
                warn!(
                    "Task {}: playlist {} not in user's listing, using placeholder",
                    task.id, playlist_id
                );
                Playlist::placeholder(playlist_id)
            }
        };

        let tracks = self.source.list_tracks(playlist_id, source_credential).await?;
        task.total_tracks = tracks.len() as u32;
        self.save(task);
        info!("Task {}: found {} tracks to sync", task.id, tracks.len());

        let name = request
            .destination_playlist_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                format!("{} (from {})", task.source_playlist.name, self.source.name())
            });
        let description = task.source_playlist.description.clone();
        let destination = self
            .provision_destination(&name, description.as_deref(), request)
            .await?;
        task.destination_playlist = Some(destination.clone());
        self.save(task);

        let delay = Duration::from_millis(self.config.track_delay_ms);
        let mut persisted_progress = task.progress;
        for (index, track) in tracks.iter().enumerate() {
            task.set_progress(progress_at(index, tracks.len()));
            let result = self
                .sync_track(&task.id, track, destination_credential)
                .await;
            task.record(result);
            // At most one mid-run snapshot per percentage point.
            if task.progress != persisted_progress {
                self.save(task);
                persisted_progress = task.progress;
            }

            if !delay.is_zero() && index + 1 < tracks.len() {
                tokio::time::sleep(delay).await;
            }
        }

        let matched: Vec<String> = task
            .track_results
            .iter()
            .filter_map(|r| r.destination_track.as_ref().map(|t| t.id.clone()))
            .collect();

        if !matched.is_empty() {
            if let Err(e) = self
                .destination
                .add_tracks(&destination.id, &matched, destination_credential)
                .await
            {
                let committed = match &e {
                    CatalogError::PartialBatch { committed, .. } => *committed,
                    _ => 0,
                };
                warn!(
                    "Task {}: adding tracks to {} failed after {}/{}: {}",
                    task.id,
                    destination.id,
                    committed,
                    matched.len(),
                    e
                );
                task.demote_uncommitted(committed, &e.to_string());
            } else {
                debug!(
                    "Task {}: added {} tracks to {}",
                    task.id,
                    matched.len(),
                    destination.id
                );
            }
        }

        task.finish();
        Ok(())
    }

    /// Reuse a same-named playlist unless `create_new`, otherwise create one.
    async fn provision_destination(
        &self,
        name: &str,
        description: Option<&str>,
        request: &SyncRequest,
    ) -> Result<Playlist, CatalogError> {
        let credential = Some(request.destination_credential.as_str());

        if !request.create_new {
            let existing = self.destination.list_playlists(credential).await?;
            if let Some(playlist) = existing.into_iter().find(|p| p.name == name) {
                info!("Reusing {} playlist '{}' ({})", self.destination.name(), name, playlist.id);
                return Ok(playlist);
            }
            debug!("No existing playlist named '{}', creating one", name);
        }

        self.destination
            .create_playlist(name, description, credential)
            .await
    }

    /// Resolve one track, containing any failure (including a panic) in its
    /// result.
    async fn sync_track(
        &self,
        task_id: &str,
        track: &Track,
        destination_credential: Option<&str>,
    ) -> TrackSyncResult {
        let outcome = AssertUnwindSafe(self.resolver.resolve(track, destination_credential))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(resolved)) => {
                TrackSyncResult::success(track.clone(), resolved.track, resolved.strategy)
            }
            Ok(Err(e @ CatalogError::TrackNotFound(_))) => {
                debug!("Task {}: {}", task_id, e);
                TrackSyncResult::not_found(track.clone(), e.to_string())
            }
            Ok(Err(e)) => {
                warn!("Task {}: error syncing track '{}': {}", task_id, track.name, e);
                TrackSyncResult::error(track.clone(), e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    "Task {}: panic while syncing track '{}': {}",
                    task_id, track.name, message
                );
                TrackSyncResult::error(track.clone(), message)
            }
        };

        metrics::TRACKS_PROCESSED
            .with_label_values(&[result.status.as_str()])
            .inc();
        result
    }

    /// Persist a live snapshot. Store failures are logged, not fatal.
    fn save(&self, task: &mut SyncTask) {
        task.updated_at = Utc::now();
        if let Err(e) = self.store.put_task(task) {
            warn!("Task {}: failed to persist snapshot: {}", task.id, e);
        }
    }

    /// Fold the task into history, then persist the terminal snapshot.
    ///
    /// A terminal snapshot in the store implies its history entry exists.
    fn complete(&self, task: &mut SyncTask, elapsed: Duration) {
        if let Err(e) = self
            .store
            .append_history(&task.summary(), self.config.history_retention)
        {
            warn!("Task {}: failed to record history: {}", task.id, e);
        }
        self.save(task);

        metrics::SYNC_TASKS
            .with_label_values(&[task.status.as_str()])
            .inc();
        metrics::SYNC_DURATION
            .with_label_values(&[task.status.as_str()])
            .observe(elapsed.as_secs_f64());

        info!(
            "Task {}: {} - {}/{} tracks synced",
            task.id, task.status, task.synced_tracks, task.total_tracks
        );
    }

    /// Fail a task whose job died without reaching a terminal status.
    pub(crate) fn abandon(&self, task_id: &str, message: &str) {
        let task = match self.store.get_task(task_id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!("Task {}: abandoned task not found in store", task_id);
                return;
            }
            Err(e) => {
                warn!("Task {}: failed to load abandoned task: {}", task_id, e);
                return;
            }
        };

        if task.status.is_terminal() {
            return;
        }

        let mut task = task;
        task.fail(message);
        let elapsed = (Utc::now() - task.created_at).to_std().unwrap_or_default();
        self.complete(&mut task, elapsed);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("Unexpected error: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("Unexpected error: {}", message)
    } else {
        "Unexpected error".to_string()
    }
}

/// Public entry point: start syncs, poll status, read history.
pub struct SyncOrchestrator {
    engine: Arc<SyncEngine>,
    pool: SyncWorkerPool,
    store: Arc<dyn SyncStore>,
    config: OrchestratorConfig,
}

impl SyncOrchestrator {
    /// Create the orchestrator and spawn its workers.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        source: Arc<dyn SourceCatalog>,
        destination: Arc<dyn DestinationCatalog>,
        store: Arc<dyn SyncStore>,
        resolver_config: ResolverConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let resolver = TrackResolver::new(Arc::clone(&destination), resolver_config);
        let engine = Arc::new(SyncEngine {
            source,
            destination,
            resolver,
            store: Arc::clone(&store),
            config: config.clone(),
        });
        let pool =
            SyncWorkerPool::spawn(Arc::clone(&engine), config.workers, config.queue_capacity);

        Self {
            engine,
            pool,
            store,
            config,
        }
    }

    /// Validate the request, persist a pending task and queue it.
    ///
    /// Returns the task ID as soon as the job is queued; progress and the
    /// outcome are read back with [`get_status`](Self::get_status).
    pub async fn start_sync(&self, request: SyncRequest) -> Result<String, SyncError> {
        request.validate().map_err(SyncError::Validation)?;

        let mut task = SyncTask::new(&request.user_id, &request.source_playlist_id);
        let task_id = task.id.clone();
        task.updated_at = Utc::now();
        self.store.put_task(&task)?;

        info!(
            "Started sync task {} for playlist {}",
            task_id, request.source_playlist_id
        );

        if let Err(e) = self.pool.submit(SyncJob { task, request }).await {
            self.engine.abandon(&task_id, &e.to_string());
            return Err(e);
        }

        Ok(task_id)
    }

    /// Latest snapshot of a task.
    pub fn get_status(&self, task_id: &str) -> Result<SyncTask, SyncError> {
        self.store
            .get_task(task_id)?
            .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))
    }

    /// A user's most recent history, newest first.
    pub fn get_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, SyncError> {
        Ok(self.store.list_history(user_id, self.config.history_limit)?)
    }

    /// Tasks matching `filter`, newest first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<SyncTask>, SyncError> {
        Ok(self.store.list_tasks(filter)?)
    }

    /// Worker pool statistics.
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Finish queued work and stop the workers.
    pub async fn shutdown(&mut self) {
        self.pool.shutdown().await;
    }
}
