//! Apple Music API client (destination catalog).
//!
//! Every request carries the developer token as a bearer credential;
//! library operations additionally carry the user's `Music-User-Token`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::AppleMusicConfig;
use crate::resolver::{self, ResolvedTrack, ResolverConfig, TrackQuery};

use super::http::{self, Outcome};
use super::{
    CatalogError, CredentialProvider, DestinationCatalog, Playlist, PlaylistImage, RateLimiter,
    Track,
};

const PROVIDER: &str = "Apple Music";

/// Backoff used when a 429 carries no `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

const USER_TOKEN_HEADER: &str = "Music-User-Token";

/// Apple Music client.
pub struct AppleMusicClient {
    client: Client,
    config: AppleMusicConfig,
    credentials: Arc<dyn CredentialProvider>,
    limiter: RateLimiter,
}

impl AppleMusicClient {
    /// Create a new Apple Music client.
    pub fn new(
        config: AppleMusicConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let limiter = RateLimiter::new(
            PROVIDER,
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        );

        Ok(Self {
            client,
            config,
            credentials,
            limiter,
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// The limiter guarding this client, shared by every caller.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Look up a song by metadata using the resolver's fallback strategies.
    pub async fn search_track(
        &self,
        query: &TrackQuery,
        user_credential: Option<&str>,
        config: &ResolverConfig,
    ) -> Result<ResolvedTrack, CatalogError> {
        resolver::resolve_with(self, config, query, user_credential).await
    }

    /// Issue one request, handling 429 and 401 with a single retry each.
    async fn send(
        &self,
        method: Method,
        url: &str,
        user_credential: Option<&str>,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Response, CatalogError> {
        let max_wait = Duration::from_secs(self.config.max_retry_after_secs);
        let mut refreshed = false;
        let mut throttled = false;

        loop {
            self.limiter.acquire().await;
            let token = self.credentials.developer_token().await?;
            debug!("Apple Music {} {}", method, url);

            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&token)
                .query(query);
            if let Some(user) = user_credential {
                request = request.header(USER_TOKEN_HEADER, user);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| {
                let err = http::map_transport_error(e);
                http::record_transport_failure(PROVIDER, &err);
                err
            })?;

            match http::classify(PROVIDER, response, DEFAULT_RETRY_AFTER).await {
                Outcome::Success(response) => return Ok(response),
                Outcome::RateLimited(wait) => {
                    if throttled || wait > max_wait {
                        warn!("Rate limited by Apple Music, retry after {}s", wait.as_secs());
                        return Err(CatalogError::RateLimited {
                            provider: PROVIDER.to_string(),
                            retry_after: wait,
                        });
                    }
                    warn!(
                        "Rate limited by Apple Music, waiting {:.1}s before retrying",
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                    throttled = true;
                }
                Outcome::Unauthorized(message) => {
                    if refreshed {
                        return Err(CatalogError::Authentication(format!(
                            "Apple Music authentication failed after token refresh: {}",
                            message
                        )));
                    }
                    warn!("Apple Music rejected developer token, refreshing: {}", message);
                    self.credentials.invalidate().await;
                    refreshed = true;
                }
                Outcome::Failed(err) => {
                    error!("Apple Music request to {} failed: {}", url, err);
                    return Err(err);
                }
            }
        }
    }

    /// Resolve a relative `next` link against the configured base URL.
    fn next_url(&self, next: &str) -> Result<String, CatalogError> {
        let base = Url::parse(self.base_url())
            .map_err(|e| CatalogError::Validation(format!("Invalid base URL: {}", e)))?;
        base.join(next)
            .map(String::from)
            .map_err(|e| CatalogError::Parse(format!("Invalid next link '{}': {}", next, e)))
    }
}

fn require_user(user_credential: Option<&str>, action: &str) -> Result<String, CatalogError> {
    match user_credential {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(CatalogError::Authentication(format!(
            "User token required to {}",
            action
        ))),
    }
}

#[async_trait]
impl DestinationCatalog for AppleMusicClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn list_playlists(
        &self,
        user_credential: Option<&str>,
    ) -> Result<Vec<Playlist>, CatalogError> {
        let user = require_user(user_credential, "list playlists")?;

        let mut playlists = Vec::new();
        let mut next = Some(format!("{}/me/library/playlists", self.base_url()));

        while let Some(url) = next {
            let response = self.send(Method::GET, &url, Some(&user), &[], None).await?;
            let page: AmData<AmLibraryPlaylist> = http::parse_json(response).await?;
            playlists.extend(page.data.into_iter().map(Playlist::from));
            next = match page.next {
                Some(link) => Some(self.next_url(&link)?),
                None => None,
            };
        }

        info!("Fetched {} Apple Music library playlists", playlists.len());
        Ok(playlists)
    }

    async fn search(
        &self,
        term: &str,
        limit: u32,
        user_credential: Option<&str>,
    ) -> Result<Vec<Track>, CatalogError> {
        if term.trim().is_empty() {
            return Err(CatalogError::Validation("Search term is empty".to_string()));
        }

        let url = format!(
            "{}/catalog/{}/search",
            self.base_url(),
            urlencoding::encode(&self.config.storefront)
        );
        let query = [
            ("term", term.to_string()),
            ("types", "songs".to_string()),
            ("limit", limit.to_string()),
        ];

        let response = self
            .send(Method::GET, &url, user_credential, &query, None)
            .await?;
        let body: AmSearchResponse = http::parse_json(response).await?;

        let songs = body.results.songs.map(|s| s.data).unwrap_or_default();
        debug!("Apple Music search '{}' returned {} songs", term, songs.len());
        Ok(songs.into_iter().map(Track::from).collect())
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        user_credential: Option<&str>,
    ) -> Result<Playlist, CatalogError> {
        let user = require_user(user_credential, "create playlists")?;
        if name.trim().is_empty() {
            return Err(CatalogError::Validation("Playlist name is empty".to_string()));
        }

        let url = format!("{}/me/library/playlists", self.base_url());
        let body = json!({
            "attributes": {
                "name": name,
                "description": description.unwrap_or_default(),
            }
        });

        let response = self
            .send(Method::POST, &url, Some(&user), &[], Some(&body))
            .await?;
        let created: AmData<AmLibraryPlaylist> = http::parse_json(response).await?;

        let playlist = created
            .data
            .into_iter()
            .next()
            .map(Playlist::from)
            .ok_or_else(|| {
                CatalogError::Parse("Failed to create playlist: No data returned".to_string())
            })?;

        info!("Created Apple Music playlist '{}' ({})", playlist.name, playlist.id);
        Ok(playlist)
    }

    async fn add_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        user_credential: Option<&str>,
    ) -> Result<(), CatalogError> {
        let user = require_user(user_credential, "modify playlists")?;
        if track_ids.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/me/library/playlists/{}/tracks",
            self.base_url(),
            urlencoding::encode(playlist_id)
        );
        let batch_size = self.config.add_tracks_batch_size.max(1);
        let mut committed = 0;

        for batch in track_ids.chunks(batch_size) {
            let body = json!({
                "data": batch
                    .iter()
                    .map(|id| json!({ "id": id, "type": "songs" }))
                    .collect::<Vec<_>>(),
            });

            match self
                .send(Method::POST, &url, Some(&user), &[], Some(&body))
                .await
            {
                Ok(_) => {
                    committed += batch.len();
                    info!("Added {} tracks to playlist {}", batch.len(), playlist_id);
                }
                Err(err) => {
                    error!(
                        "Failed to add tracks to playlist {} after {} committed: {}",
                        playlist_id, committed, err
                    );
                    if committed == 0 {
                        return Err(err);
                    }
                    return Err(CatalogError::PartialBatch {
                        committed,
                        source: Box::new(err),
                    });
                }
            }
        }

        Ok(())
    }
}

// Apple Music API response types

#[derive(Debug, Deserialize)]
struct AmData<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AmSearchResponse {
    #[serde(default)]
    results: AmSearchResults,
}

#[derive(Debug, Default, Deserialize)]
struct AmSearchResults {
    songs: Option<AmData<AmSong>>,
}

#[derive(Debug, Deserialize)]
struct AmSong {
    id: String,
    #[serde(default)]
    attributes: AmSongAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AmSongAttributes {
    name: String,
    artist_name: String,
    album_name: String,
    duration_in_millis: u64,
    isrc: Option<String>,
    previews: Vec<AmPreview>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AmPreview {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AmLibraryPlaylist {
    id: String,
    #[serde(default)]
    attributes: AmPlaylistAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AmPlaylistAttributes {
    name: String,
    description: Option<AmDescription>,
    is_public: bool,
    artwork: Option<AmArtwork>,
}

#[derive(Debug, Deserialize)]
struct AmDescription {
    standard: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AmArtwork {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl From<AmSong> for Track {
    fn from(song: AmSong) -> Self {
        let attrs = song.attributes;
        let mut external_urls = std::collections::BTreeMap::new();
        external_urls.insert("apple_music".to_string(), attrs.url.unwrap_or_default());

        Track {
            id: song.id,
            name: attrs.name,
            artist: attrs.artist_name,
            album: attrs.album_name,
            duration_ms: attrs.duration_in_millis,
            isrc: attrs.isrc,
            preview_url: attrs.previews.into_iter().next().map(|p| p.url),
            external_urls,
        }
    }
}

impl From<AmLibraryPlaylist> for Playlist {
    fn from(p: AmLibraryPlaylist) -> Self {
        let attrs = p.attributes;
        Playlist {
            id: p.id,
            name: attrs.name,
            description: attrs
                .description
                .and_then(|d| d.standard)
                .filter(|d| !d.is_empty()),
            track_count: 0,
            // Library playlists always belong to the authenticated user.
            owner: String::new(),
            public: attrs.is_public,
            collaborative: false,
            external_urls: Default::default(),
            images: attrs
                .artwork
                .map(|a| PlaylistImage {
                    url: a.url,
                    width: a.width,
                    height: a.height,
                })
                .into_iter()
                .collect(),
        }
    }
}
