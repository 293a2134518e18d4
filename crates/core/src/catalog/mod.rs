//! Music catalog access.
//!
//! The source side ([`SourceCatalog`]) lists playlists and their tracks;
//! the destination side ([`DestinationCatalog`]) searches, creates playlists
//! and appends tracks. Concrete clients wrap a per-provider
//! [`RateLimiter`] and classify HTTP failures into [`CatalogError`].

mod apple_music;
mod credentials;
mod developer_token;
pub(crate) mod http;
mod rate_limiter;
mod spotify;
mod types;

pub use apple_music::AppleMusicClient;
pub use credentials::{
    CachedCredentialProvider, CredentialProvider, StaticCredentialProvider, TokenSource,
    DEVELOPER_TOKEN_TTL,
};
pub use developer_token::{
    DeveloperTokenClaims, JwtTokenSource, DEVELOPER_TOKEN_AUDIENCE, DEVELOPER_TOKEN_LIFETIME_SECS,
};
pub use rate_limiter::{RateLimitStatus, RateLimiter};
pub use spotify::SpotifyClient;
pub use types::*;
