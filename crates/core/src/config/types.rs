use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::resolver::ResolverConfig;
use crate::sync::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub apple_music: AppleMusicConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Spotify (source catalog) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpotifyConfig {
    #[serde(default = "default_spotify_url")]
    pub base_url: String,
    /// Requests allowed per window
    #[serde(default = "default_spotify_rate_limit")]
    pub rate_limit_requests: usize,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
    /// Items requested per page (Spotify caps this at 50)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Longest server-requested backoff we are willing to sleep through
    #[serde(default = "default_max_retry_after")]
    pub max_retry_after_secs: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            base_url: default_spotify_url(),
            rate_limit_requests: default_spotify_rate_limit(),
            rate_limit_window_secs: default_rate_limit_window(),
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
            max_retry_after_secs: default_max_retry_after(),
        }
    }
}

/// Apple Music (destination catalog) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppleMusicConfig {
    #[serde(default = "default_apple_music_url")]
    pub base_url: String,
    /// Catalog storefront (country code) used for searches
    #[serde(default = "default_storefront")]
    pub storefront: String,
    /// Pre-issued developer token
    #[serde(default)]
    pub developer_token: Option<String>,
    /// MusicKit key ID, used with `team_id` and `private_key_path` to sign
    /// developer tokens. Takes precedence over `developer_token`.
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    /// PEM (`.p8`) MusicKit private key
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_apple_music_rate_limit")]
    pub rate_limit_requests: usize,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retry_after")]
    pub max_retry_after_secs: u64,
    /// Track IDs per add-tracks request (Apple Music accepts at most 25)
    #[serde(default = "default_batch_size")]
    pub add_tracks_batch_size: usize,
}

impl Default for AppleMusicConfig {
    fn default() -> Self {
        Self {
            base_url: default_apple_music_url(),
            storefront: default_storefront(),
            developer_token: None,
            key_id: None,
            team_id: None,
            private_key_path: None,
            rate_limit_requests: default_apple_music_rate_limit(),
            rate_limit_window_secs: default_rate_limit_window(),
            timeout_secs: default_timeout(),
            max_retry_after_secs: default_max_retry_after(),
            add_tracks_batch_size: default_batch_size(),
        }
    }
}

/// MusicKit signing key settings, when all three are present.
#[derive(Debug, Clone, Copy)]
pub struct SigningKey<'a> {
    pub key_id: &'a str,
    pub team_id: &'a str,
    pub private_key_path: &'a Path,
}

impl AppleMusicConfig {
    /// The configured signing key, if `key_id`, `team_id` and
    /// `private_key_path` are all set.
    pub fn signing_key(&self) -> Option<SigningKey<'_>> {
        let key_id = self.key_id.as_deref().filter(|s| !s.is_empty())?;
        let team_id = self.team_id.as_deref().filter(|s| !s.is_empty())?;
        let private_key_path = self.private_key_path.as_deref()?;
        Some(SigningKey {
            key_id,
            team_id,
            private_key_path,
        })
    }
}

/// Largest add-tracks batch Apple Music accepts.
pub const MAX_ADD_TRACKS_BATCH: usize = 25;

fn default_spotify_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_apple_music_url() -> String {
    "https://api.music.apple.com/v1".to_string()
}

fn default_storefront() -> String {
    "us".to_string()
}

fn default_spotify_rate_limit() -> usize {
    100
}

fn default_apple_music_rate_limit() -> usize {
    333
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_page_size() -> u32 {
    50
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retry_after() -> u64 {
    120
}

fn default_batch_size() -> usize {
    MAX_ADD_TRACKS_BATCH
}

/// Database configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file for tasks and history. In-memory storage when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub spotify: SpotifyConfig,
    pub apple_music: SanitizedAppleMusicConfig,
    pub resolver: ResolverConfig,
    pub orchestrator: OrchestratorConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Sanitized Apple Music config (developer token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAppleMusicConfig {
    pub base_url: String,
    pub storefront: String,
    pub developer_token_configured: bool,
    pub key_id: Option<String>,
    pub team_id: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub rate_limit_requests: usize,
    pub rate_limit_window_secs: u64,
    pub timeout_secs: u64,
    pub max_retry_after_secs: u64,
    pub add_tracks_batch_size: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let apple = &config.apple_music;
        Self {
            spotify: config.spotify.clone(),
            apple_music: SanitizedAppleMusicConfig {
                base_url: apple.base_url.clone(),
                storefront: apple.storefront.clone(),
                developer_token_configured: apple
                    .developer_token
                    .as_ref()
                    .is_some_and(|t| !t.is_empty()),
                key_id: apple.key_id.clone(),
                team_id: apple.team_id.clone(),
                private_key_path: apple.private_key_path.clone(),
                rate_limit_requests: apple.rate_limit_requests,
                rate_limit_window_secs: apple.rate_limit_window_secs,
                timeout_secs: apple.timeout_secs,
                max_retry_after_secs: apple.max_retry_after_secs,
                add_tracks_batch_size: apple.add_tracks_batch_size,
            },
            resolver: config.resolver.clone(),
            orchestrator: config.orchestrator.clone(),
            database: config.database.clone(),
            logging: config.logging.clone(),
        }
    }
}
