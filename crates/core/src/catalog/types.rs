//! Types shared by every catalog provider.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A track as fetched from a catalog.
///
/// `artist` is the display string for all credited artists (joined with
/// `", "` when the provider lists several).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Provider-specific track ID.
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    /// International Standard Recording Code, when the provider exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Links keyed by provider (e.g. `spotify`, `apple_music`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_urls: BTreeMap<String, String>,
}

/// Artwork reference for a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Playlist metadata. Tracks are fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub track_count: u32,
    /// Owner display name.
    pub owner: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub collaborative: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_urls: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<PlaylistImage>,
}

impl Playlist {
    /// Descriptor used when the source playlist is missing from the user's
    /// listing.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Playlist {}", id),
            description: None,
            track_count: 0,
            owner: "Unknown".to_string(),
            public: false,
            collaborative: false,
            external_urls: BTreeMap::new(),
            images: Vec::new(),
        }
    }
}

/// Errors that can occur when talking to a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Missing or rejected credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider throttled us (HTTP 429).
    #[error("Rate limited by {provider}, retry in {}ms", retry_after.as_millis())]
    RateLimited {
        provider: String,
        retry_after: Duration,
    },

    /// Non-retryable 4xx response.
    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },

    /// 5xx response.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Connection or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// Failed to parse a response body.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Malformed input to an operation.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Resolution exhausted every search strategy.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// A batched write failed after some batches were already committed.
    #[error("Failed after committing {committed} items: {source}")]
    PartialBatch {
        committed: usize,
        source: Box<CatalogError>,
    },
}

impl CatalogError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::RateLimited { .. }
            | CatalogError::Server { .. }
            | CatalogError::Network(_)
            | CatalogError::Timeout => true,
            CatalogError::PartialBatch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Authentication(_) => "authentication",
            CatalogError::RateLimited { .. } => "rate_limited",
            CatalogError::Client { .. } => "client_error",
            CatalogError::Server { .. } => "server_error",
            CatalogError::Network(_) => "network",
            CatalogError::Timeout => "timeout",
            CatalogError::Parse(_) => "parse",
            CatalogError::Validation(_) => "validation",
            CatalogError::TrackNotFound(_) => "not_found",
            CatalogError::PartialBatch { .. } => "partial_batch",
        }
    }
}

/// Read side of a sync: the catalog playlists are copied from.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Provider name for logging and default playlist naming.
    fn name(&self) -> &str;

    /// All playlists visible to the user, in server order.
    async fn list_playlists(&self, user_credential: &str) -> Result<Vec<Playlist>, CatalogError>;

    /// Every playable track of a playlist, in playlist order.
    async fn list_tracks(
        &self,
        playlist_id: &str,
        user_credential: &str,
    ) -> Result<Vec<Track>, CatalogError>;
}

/// Write side of a sync: the catalog playlists are copied into.
#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// The user's library playlists, in server order.
    async fn list_playlists(
        &self,
        user_credential: Option<&str>,
    ) -> Result<Vec<Playlist>, CatalogError>;

    /// Free-text catalog search for songs.
    async fn search(
        &self,
        term: &str,
        limit: u32,
        user_credential: Option<&str>,
    ) -> Result<Vec<Track>, CatalogError>;

    /// Create an empty playlist in the user's library.
    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        user_credential: Option<&str>,
    ) -> Result<Playlist, CatalogError>;

    /// Append tracks to a library playlist.
    ///
    /// Implementations that batch must stop at the first failed batch and
    /// report how many IDs were already committed via
    /// [`CatalogError::PartialBatch`].
    async fn add_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        user_credential: Option<&str>,
    ) -> Result<(), CatalogError>;
}
