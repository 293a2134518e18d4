//! Mock destination catalog for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, DestinationCatalog, Playlist, Track};

/// A recorded search for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub term: String,
    pub limit: u32,
    pub user_credential: Option<String>,
}

/// How `add_tracks` should fail.
#[derive(Debug, Clone, Copy)]
struct AddTracksFailure {
    committed: usize,
}

/// Mock implementation of the DestinationCatalog trait.
///
/// Search results are keyed by the exact search term; unknown terms return
/// no results. Failures and panics can be injected per term.
///
/// # Example
///
/// ```rust,ignore
/// use crossfade_core::testing::{MockDestinationCatalog, fixtures};
///
/// let destination = MockDestinationCatalog::new();
/// destination
///     .add_search_result("Ed Sheeran Perfect", fixtures::track("am1", "Perfect", "Ed Sheeran", ""))
///     .await;
///
/// // ... run a sync ...
///
/// let searches = destination.recorded_searches().await;
/// assert_eq!(searches[0].term, "Ed Sheeran Perfect");
/// ```
pub struct MockDestinationCatalog {
    name: String,
    search_results: Arc<RwLock<HashMap<String, Vec<Track>>>>,
    failing_terms: Arc<RwLock<HashSet<String>>>,
    panic_terms: Arc<RwLock<HashSet<String>>>,
    library: Arc<RwLock<Vec<Playlist>>>,
    create_error: Arc<RwLock<Option<CatalogError>>>,
    add_tracks_failure: Arc<RwLock<Option<AddTracksFailure>>>,
    search_delay: Arc<RwLock<Duration>>,
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    created: Arc<RwLock<Vec<String>>>,
    added: Arc<RwLock<Vec<(String, Vec<String>)>>>,
}

impl std::fmt::Debug for MockDestinationCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDestinationCatalog")
            .field("name", &self.name)
            .field("search_results", &"<results>")
            .field("searches", &"<searches>")
            .finish()
    }
}

impl Default for MockDestinationCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDestinationCatalog {
    /// Create an empty mock named "Apple Music".
    pub fn new() -> Self {
        Self {
            name: "Apple Music".to_string(),
            search_results: Arc::new(RwLock::new(HashMap::new())),
            failing_terms: Arc::new(RwLock::new(HashSet::new())),
            panic_terms: Arc::new(RwLock::new(HashSet::new())),
            library: Arc::new(RwLock::new(Vec::new())),
            create_error: Arc::new(RwLock::new(None)),
            add_tracks_failure: Arc::new(RwLock::new(None)),
            search_delay: Arc::new(RwLock::new(Duration::ZERO)),
            searches: Arc::new(RwLock::new(Vec::new())),
            created: Arc::new(RwLock::new(Vec::new())),
            added: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a result for an exact search term.
    pub async fn add_search_result(&self, term: &str, track: Track) {
        self.search_results
            .write()
            .await
            .entry(term.to_string())
            .or_default()
            .push(track);
    }

    /// Searches for `term` fail with a 503.
    pub async fn fail_search_term(&self, term: &str) {
        self.failing_terms.write().await.insert(term.to_string());
    }

    /// Searches for `term` panic.
    pub async fn panic_on_search_term(&self, term: &str) {
        self.panic_terms.write().await.insert(term.to_string());
    }

    /// Add an existing playlist to the user's library.
    pub async fn add_library_playlist(&self, playlist: Playlist) {
        self.library.write().await.push(playlist);
    }

    /// Configure the next `create_playlist` to fail.
    pub async fn set_create_error(&self, error: CatalogError) {
        *self.create_error.write().await = Some(error);
    }

    /// Make `add_tracks` fail after `committed` IDs were written.
    pub async fn fail_add_tracks_after(&self, committed: usize) {
        *self.add_tracks_failure.write().await = Some(AddTracksFailure { committed });
    }

    /// Delay every search.
    pub async fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.write().await = delay;
    }

    /// Get recorded searches.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Names of created playlists.
    pub async fn recorded_created_playlists(&self) -> Vec<String> {
        self.created.read().await.clone()
    }

    /// `(playlist_id, ids)` for every `add_tracks` call.
    pub async fn recorded_added_tracks(&self) -> Vec<(String, Vec<String>)> {
        self.added.read().await.clone()
    }
}

#[async_trait]
impl DestinationCatalog for MockDestinationCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_playlists(
        &self,
        _user_credential: Option<&str>,
    ) -> Result<Vec<Playlist>, CatalogError> {
        Ok(self.library.read().await.clone())
    }

    async fn search(
        &self,
        term: &str,
        limit: u32,
        user_credential: Option<&str>,
    ) -> Result<Vec<Track>, CatalogError> {
        self.searches.write().await.push(RecordedSearch {
            term: term.to_string(),
            limit,
            user_credential: user_credential.map(String::from),
        });

        let delay = *self.search_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let should_panic = self.panic_terms.read().await.contains(term);
        if should_panic {
            panic!("search exploded for '{}'", term);
        }

        if self.failing_terms.read().await.contains(term) {
            return Err(CatalogError::Server {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }

        Ok(self
            .search_results
            .read()
            .await
            .get(term)
            .map(|results| results.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        user_credential: Option<&str>,
    ) -> Result<Playlist, CatalogError> {
        if let Some(err) = self.create_error.write().await.take() {
            return Err(err);
        }
        if user_credential.is_none_or(str::is_empty) {
            return Err(CatalogError::Authentication(
                "User token required to create playlists".to_string(),
            ));
        }

        let mut created = self.created.write().await;
        created.push(name.to_string());

        let mut playlist = Playlist::placeholder(&format!("p.mock{}", created.len()));
        playlist.name = name.to_string();
        playlist.description = description.map(String::from);
        playlist.owner = String::new();
        Ok(playlist)
    }

    async fn add_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        _user_credential: Option<&str>,
    ) -> Result<(), CatalogError> {
        self.added
            .write()
            .await
            .push((playlist_id.to_string(), track_ids.to_vec()));

        match *self.add_tracks_failure.read().await {
            Some(AddTracksFailure { committed }) => {
                let source = CatalogError::Server {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                };
                if committed == 0 {
                    Err(source)
                } else {
                    Err(CatalogError::PartialBatch {
                        committed: committed.min(track_ids.len()),
                        source: Box::new(source),
                    })
                }
            }
            None => Ok(()),
        }
    }
}
