pub mod catalog;
pub mod config;
pub mod metrics;
pub mod resolver;
pub mod sync;
pub mod testing;

pub use catalog::{
    AppleMusicClient, CachedCredentialProvider, CatalogError, CredentialProvider,
    DestinationCatalog, JwtTokenSource, Playlist, PlaylistImage, RateLimitStatus, RateLimiter,
    SourceCatalog, SpotifyClient, StaticCredentialProvider, TokenSource, Track,
};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, AppleMusicConfig,
    Config, ConfigError, DatabaseConfig, LoggingConfig, SanitizedConfig, SpotifyConfig,
};
pub use resolver::{MatchStrategy, ResolvedTrack, ResolverConfig, TrackQuery, TrackResolver};
pub use sync::{
    HistoryEntry, MemorySyncStore, OrchestratorConfig, PoolStatus, SqliteSyncStore, StoreError,
    SyncError, SyncOrchestrator, SyncRequest, SyncStatus, SyncStore, SyncTask, TaskFilter,
    TrackResultStatus, TrackSyncResult,
};
