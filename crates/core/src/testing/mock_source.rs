//! Mock source catalog for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, Playlist, SourceCatalog, Track};

/// Mock implementation of the SourceCatalog trait.
///
/// Provides controllable behavior for testing:
/// - Configurable playlists and their tracks
/// - Injected failures
/// - Simulated latency for concurrency tests
///
/// # Example
///
/// ```rust,ignore
/// use crossfade_core::testing::{MockSourceCatalog, fixtures};
///
/// let source = MockSourceCatalog::new();
/// source.add_playlist(
///     fixtures::playlist("pl1", "Road Trip"),
///     vec![fixtures::source_track("s1", "Perfect", "Ed Sheeran", None)],
/// ).await;
/// ```
pub struct MockSourceCatalog {
    name: String,
    /// Playlists returned by `list_playlists`, in order.
    playlists: Arc<RwLock<Vec<Playlist>>>,
    /// Tracks by playlist ID.
    tracks: Arc<RwLock<HashMap<String, Vec<Track>>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
    /// Delay applied to every `list_tracks` call.
    delay: Arc<RwLock<Duration>>,
    /// Number of `list_tracks` calls.
    track_fetches: Arc<RwLock<usize>>,
}

impl std::fmt::Debug for MockSourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSourceCatalog")
            .field("name", &self.name)
            .field("playlists", &"<playlists>")
            .field("tracks", &"<tracks>")
            .finish()
    }
}

impl Default for MockSourceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSourceCatalog {
    /// Create an empty mock named "Spotify".
    pub fn new() -> Self {
        Self {
            name: "Spotify".to_string(),
            playlists: Arc::new(RwLock::new(Vec::new())),
            tracks: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            track_fetches: Arc::new(RwLock::new(0)),
        }
    }

    /// Add a playlist to the listing together with its tracks.
    pub async fn add_playlist(&self, mut playlist: Playlist, tracks: Vec<Track>) {
        playlist.track_count = tracks.len() as u32;
        self.tracks
            .write()
            .await
            .insert(playlist.id.clone(), tracks);
        self.playlists.write().await.push(playlist);
    }

    /// Serve tracks for a playlist that is absent from the listing.
    pub async fn set_unlisted_tracks(&self, playlist_id: &str, tracks: Vec<Track>) {
        self.tracks
            .write()
            .await
            .insert(playlist_id.to_string(), tracks);
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every `list_tracks` call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Number of `list_tracks` calls made.
    pub async fn track_fetch_count(&self) -> usize {
        *self.track_fetches.read().await
    }

    async fn take_error(&self) -> Option<CatalogError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl SourceCatalog for MockSourceCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_playlists(&self, user_credential: &str) -> Result<Vec<Playlist>, CatalogError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if user_credential.is_empty() {
            return Err(CatalogError::Authentication("missing token".to_string()));
        }
        Ok(self.playlists.read().await.clone())
    }

    async fn list_tracks(
        &self,
        playlist_id: &str,
        _user_credential: &str,
    ) -> Result<Vec<Track>, CatalogError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        *self.track_fetches.write().await += 1;

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.tracks
            .read()
            .await
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| CatalogError::Client {
                status: 404,
                message: format!("Playlist {} not found", playlist_id),
            })
    }
}
