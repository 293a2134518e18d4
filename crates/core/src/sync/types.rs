//! Sync task types and state transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Playlist, Track};
use crate::resolver::MatchStrategy;

/// Lifecycle of a sync task.
///
/// `Pending -> InProgress -> {Completed | Partial | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Partial,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Completed => "completed",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Partial | SyncStatus::Failed
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of syncing one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackResultStatus {
    Success,
    NotFound,
    Error,
}

impl TrackResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackResultStatus::Success => "success",
            TrackResultStatus::NotFound => "not_found",
            TrackResultStatus::Error => "error",
        }
    }
}

/// One source track and what became of it.
///
/// `destination_track` is present exactly when `status` is `Success`; the
/// constructors are the only way this type is built inside the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSyncResult {
    pub source_track: Track,
    pub destination_track: Option<Track>,
    pub status: TrackResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_strategy: Option<MatchStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TrackSyncResult {
    pub fn success(source: Track, destination: Track, strategy: MatchStrategy) -> Self {
        Self {
            source_track: source,
            destination_track: Some(destination),
            status: TrackResultStatus::Success,
            match_strategy: Some(strategy),
            error_message: None,
        }
    }

    pub fn not_found(source: Track, message: impl Into<String>) -> Self {
        Self {
            source_track: source,
            destination_track: None,
            status: TrackResultStatus::NotFound,
            match_strategy: None,
            error_message: Some(message.into()),
        }
    }

    pub fn error(source: Track, message: impl Into<String>) -> Self {
        Self {
            source_track: source,
            destination_track: None,
            status: TrackResultStatus::Error,
            match_strategy: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TrackResultStatus::Success
    }
}

/// One source-playlist to destination-playlist sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub id: String,
    pub user_id: String,
    pub status: SyncStatus,
    /// Placeholder until the source listing has been fetched.
    pub source_playlist: Playlist,
    pub destination_playlist: Option<Playlist>,
    /// Percentage in `[0, 100]`, never decreasing.
    pub progress: u8,
    pub total_tracks: u32,
    pub synced_tracks: u32,
    pub failed_tracks: u32,
    pub track_results: Vec<TrackSyncResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Error message for a finished task that synced nothing.
pub const NO_TRACKS_SYNCED: &str = "No tracks could be synced";

impl SyncTask {
    /// Create a pending task with a fresh ID.
    pub fn new(user_id: impl Into<String>, source_playlist_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            status: SyncStatus::Pending,
            source_playlist: Playlist::placeholder(source_playlist_id),
            destination_playlist: None,
            progress: 0,
            total_tracks: 0,
            synced_tracks: 0,
            failed_tracks: 0,
            track_results: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn start(&mut self) {
        self.status = SyncStatus::InProgress;
    }

    /// Raise progress to `percent` (capped at 100); lower values are ignored.
    pub fn set_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }

    /// Append a track result and update the counters.
    pub fn record(&mut self, result: TrackSyncResult) {
        if result.is_success() {
            self.synced_tracks += 1;
        } else {
            self.failed_tracks += 1;
        }
        self.track_results.push(result);
    }

    /// Turn successful results past the first `committed` into errors.
    ///
    /// Used when appending matches to the destination playlist failed part
    /// way; the first `committed` matches (in playlist order) were written.
    pub fn demote_uncommitted(&mut self, committed: usize, message: &str) {
        let mut seen = 0;
        for result in self.track_results.iter_mut().filter(|r| r.is_success()) {
            seen += 1;
            if seen <= committed {
                continue;
            }
            *result = TrackSyncResult::error(
                result.source_track.clone(),
                format!("Failed to add track to playlist: {}", message),
            );
            self.synced_tracks -= 1;
            self.failed_tracks += 1;
        }
    }

    /// Close out a task whose track loop ran to the end.
    pub fn finish(&mut self) {
        self.progress = 100;
        self.completed_at = Some(Utc::now());

        if self.synced_tracks > 0 && self.synced_tracks == self.total_tracks {
            self.status = SyncStatus::Completed;
        } else if self.synced_tracks > 0 {
            self.status = SyncStatus::Partial;
        } else {
            self.status = SyncStatus::Failed;
            self.error_message = Some(NO_TRACKS_SYNCED.to_string());
        }
    }

    /// Abort the task with a task-level error.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SyncStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// History summary of this task.
    pub fn summary(&self) -> HistoryEntry {
        HistoryEntry {
            task_id: self.id.clone(),
            user_id: self.user_id.clone(),
            source_playlist_id: self.source_playlist.id.clone(),
            source_playlist_name: self.source_playlist.name.clone(),
            destination_playlist_id: self.destination_playlist.as_ref().map(|p| p.id.clone()),
            destination_playlist_name: self
                .destination_playlist
                .as_ref()
                .map(|p| p.name.clone()),
            status: self.status,
            total_tracks: self.total_tracks,
            synced_tracks: self.synced_tracks,
            failed_tracks: self.failed_tracks,
            created_at: self.created_at,
            completed_at: self.completed_at,
            error_message: self.error_message.clone(),
        }
    }
}

/// Progress before processing track `index` of `total`.
pub fn progress_at(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (index.min(total) * 100 / total) as u8
}

/// Terminal summary of a task, without per-track results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: String,
    pub user_id: String,
    pub source_playlist_id: String,
    pub source_playlist_name: String,
    pub destination_playlist_id: Option<String>,
    pub destination_playlist_name: Option<String>,
    pub status: SyncStatus,
    pub total_tracks: u32,
    pub synced_tracks: u32,
    pub failed_tracks: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Parameters for starting a sync.
#[derive(Clone)]
pub struct SyncRequest {
    pub user_id: String,
    pub source_playlist_id: String,
    pub source_credential: String,
    pub destination_credential: String,
    /// Always create a new destination playlist instead of reusing one with
    /// the same name.
    pub create_new: bool,
    /// Overrides the default `"{source name} (from {provider})"`.
    pub destination_playlist_name: Option<String>,
}

impl SyncRequest {
    pub fn new(
        user_id: impl Into<String>,
        source_playlist_id: impl Into<String>,
        source_credential: impl Into<String>,
        destination_credential: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source_playlist_id: source_playlist_id.into(),
            source_credential: source_credential.into(),
            destination_credential: destination_credential.into(),
            create_new: true,
            destination_playlist_name: None,
        }
    }

    pub fn with_create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    pub fn with_destination_name(mut self, name: impl Into<String>) -> Self {
        self.destination_playlist_name = Some(name.into());
        self
    }

    /// Check required fields, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("user_id is required".to_string());
        }
        if self.source_playlist_id.trim().is_empty() {
            return Err("source_playlist_id is required".to_string());
        }
        if self.source_credential.is_empty() {
            return Err("source credential is required".to_string());
        }
        if self.destination_credential.is_empty() {
            return Err("destination credential is required".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRequest")
            .field("user_id", &self.user_id)
            .field("source_playlist_id", &self.source_playlist_id)
            .field("source_credential", &"<redacted>")
            .field("destination_credential", &"<redacted>")
            .field("create_new", &self.create_new)
            .field("destination_playlist_name", &self.destination_playlist_name)
            .finish()
    }
}
