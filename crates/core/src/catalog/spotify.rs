//! Spotify Web API client (source catalog).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::SpotifyConfig;

use super::http::{self, Outcome};
use super::{CatalogError, Playlist, PlaylistImage, RateLimiter, SourceCatalog, Track};

const PROVIDER: &str = "Spotify";

/// Backoff used when a 429 carries no `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Spotify client authenticating with the user's bearer token.
pub struct SpotifyClient {
    client: Client,
    config: SpotifyConfig,
    limiter: RateLimiter,
}

impl SpotifyClient {
    /// Create a new Spotify client.
    pub fn new(config: SpotifyConfig) -> Result<Self, CatalogError> {
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
            limiter,
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// GET a JSON document, waiting out one 429 before giving up.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        user_credential: &str,
    ) -> Result<T, CatalogError> {
        let max_wait = Duration::from_secs(self.config.max_retry_after_secs);
        let mut throttled = false;

        loop {
            self.limiter.acquire().await;
            debug!("Spotify GET {}", url);

            let response = self
                .client
                .get(url)
                .bearer_auth(user_credential)
                .send()
                .await
                .map_err(|e| {
                    let err = http::map_transport_error(e);
                    http::record_transport_failure(PROVIDER, &err);
                    err
                })?;

            match http::classify(PROVIDER, response, DEFAULT_RETRY_AFTER).await {
                Outcome::Success(response) => return http::parse_json(response).await,
                Outcome::RateLimited(wait) => {
                    if throttled || wait > max_wait {
                        return Err(CatalogError::RateLimited {
                            provider: PROVIDER.to_string(),
                            retry_after: wait,
                        });
                    }
                    warn!("Spotify rate limited, retrying in {:.1}s", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                    throttled = true;
                }
                Outcome::Unauthorized(message) => {
                    // User tokens are refreshed by the caller, not here.
                    return Err(CatalogError::Authentication(message));
                }
                Outcome::Failed(err) => return Err(err),
            }
        }
    }

    /// Follow `next` links from `first_url`, collecting every page's items.
    async fn paginate<T: DeserializeOwned>(
        &self,
        first_url: String,
        user_credential: &str,
    ) -> Result<Vec<T>, CatalogError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let page: SpPage<T> = self.get_json(&url, user_credential).await?;
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }
}

#[async_trait]
impl SourceCatalog for SpotifyClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn list_playlists(&self, user_credential: &str) -> Result<Vec<Playlist>, CatalogError> {
        if user_credential.is_empty() {
            return Err(CatalogError::Authentication(
                "Spotify user token required".to_string(),
            ));
        }

        let url = format!("{}/me/playlists?limit={}", self.base_url(), self.config.page_size);
        let raw: Vec<SpPlaylist> = self.paginate(url, user_credential).await?;
        let playlists: Vec<Playlist> = raw.into_iter().map(Playlist::from).collect();

        info!("Fetched {} Spotify playlists", playlists.len());
        Ok(playlists)
    }

    async fn list_tracks(
        &self,
        playlist_id: &str,
        user_credential: &str,
    ) -> Result<Vec<Track>, CatalogError> {
        if playlist_id.is_empty() {
            return Err(CatalogError::Validation("Playlist ID is empty".to_string()));
        }
        if user_credential.is_empty() {
            return Err(CatalogError::Authentication(
                "Spotify user token required".to_string(),
            ));
        }

        let url = format!(
            "{}/playlists/{}/tracks?limit={}",
            self.base_url(),
            urlencoding::encode(playlist_id),
            self.config.page_size
        );
        let items: Vec<SpPlaylistItem> = self.paginate(url, user_credential).await?;
        let fetched = items.len();

        let tracks: Vec<Track> = items
            .into_iter()
            .filter_map(|item| item.track)
            .filter(|track| track.kind.as_deref() == Some("track"))
            .map(Track::from)
            .collect();

        if tracks.len() < fetched {
            debug!(
                "Dropped {} non-track items from playlist {}",
                fetched - tracks.len(),
                playlist_id
            );
        }
        info!("Fetched {} tracks from Spotify playlist {}", tracks.len(), playlist_id);
        Ok(tracks)
    }
}

// Spotify API response types

#[derive(Debug, Deserialize)]
struct SpPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpPlaylist {
    id: String,
    name: String,
    description: Option<String>,
    tracks: Option<SpTracksRef>,
    owner: SpOwner,
    public: Option<bool>,
    #[serde(default)]
    collaborative: bool,
    #[serde(default)]
    external_urls: BTreeMap<String, String>,
    images: Option<Vec<SpImage>>,
}

#[derive(Debug, Deserialize)]
struct SpTracksRef {
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct SpOwner {
    id: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpImage {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SpPlaylistItem {
    track: Option<SpTrack>,
}

/// Lenient so podcast episodes deserialize before being filtered out.
#[derive(Debug, Deserialize)]
struct SpTrack {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    artists: Vec<SpArtist>,
    album: Option<SpAlbum>,
    #[serde(default)]
    duration_ms: u64,
    external_ids: Option<SpExternalIds>,
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SpArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpAlbum {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpExternalIds {
    isrc: Option<String>,
}

impl From<SpPlaylist> for Playlist {
    fn from(p: SpPlaylist) -> Self {
        Playlist {
            id: p.id,
            name: p.name,
            description: p.description.filter(|d| !d.is_empty()),
            track_count: p.tracks.map(|t| t.total).unwrap_or(0),
            owner: p
                .owner
                .display_name
                .filter(|n| !n.is_empty())
                .unwrap_or(p.owner.id),
            public: p.public.unwrap_or(false),
            collaborative: p.collaborative,
            external_urls: p.external_urls,
            images: p
                .images
                .unwrap_or_default()
                .into_iter()
                .map(|i| PlaylistImage {
                    url: i.url,
                    width: i.width,
                    height: i.height,
                })
                .collect(),
        }
    }
}

impl From<SpTrack> for Track {
    fn from(t: SpTrack) -> Self {
        let artist = t
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Track {
            // Local files carry no catalog ID.
            id: t.id.unwrap_or_default(),
            name: t.name,
            artist,
            album: t.album.map(|a| a.name).unwrap_or_default(),
            duration_ms: t.duration_ms,
            isrc: t.external_ids.and_then(|ids| ids.isrc),
            preview_url: t.preview_url,
            external_urls: t.external_urls,
        }
    }
}
