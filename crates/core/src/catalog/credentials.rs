//! Provider-level credentials (developer tokens).
//!
//! User credentials are passed per call as opaque strings; only the
//! integration-wide developer token is cached here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::CatalogError;

/// How long a minted developer token is reused before minting a new one.
pub const DEVELOPER_TOKEN_TTL: Duration = Duration::from_secs(5 * 60 * 60 + 30 * 60);

/// Supplies the developer token for a provider.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current developer token, minting one if needed.
    async fn developer_token(&self) -> Result<String, CatalogError>;

    /// Drop any cached token so the next call fetches a fresh one.
    async fn invalidate(&self);
}

/// Serves a fixed, pre-issued token.
pub struct StaticCredentialProvider {
    token: String,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn developer_token(&self) -> Result<String, CatalogError> {
        if self.token.is_empty() {
            return Err(CatalogError::Authentication(
                "No developer token configured".to_string(),
            ));
        }
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {
        // Nothing to refresh; a rejected static token fails again on retry.
        debug!("Static developer token invalidated (no-op)");
    }
}

/// Mints new developer tokens (e.g. by signing a JWT).
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn mint(&self) -> Result<String, CatalogError>;
}

struct CachedToken {
    token: String,
    minted_at: Instant,
}

/// Caches tokens from a [`TokenSource`] until invalidated or expired.
pub struct CachedCredentialProvider {
    source: Arc<dyn TokenSource>,
    ttl: Duration,
    cached: RwLock<Option<CachedToken>>,
}

impl CachedCredentialProvider {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_ttl(source, DEVELOPER_TOKEN_TTL)
    }

    pub fn with_ttl(source: Arc<dyn TokenSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl CredentialProvider for CachedCredentialProvider {
    async fn developer_token(&self) -> Result<String, CatalogError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.minted_at.elapsed() < self.ttl {
                    return Ok(entry.token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have minted while we waited for the write lock.
        if let Some(entry) = cached.as_ref() {
            if entry.minted_at.elapsed() < self.ttl {
                return Ok(entry.token.clone());
            }
        }

        let token = self.source.mint().await?;
        info!("Minted new developer token");
        *cached = Some(CachedToken {
            token: token.clone(),
            minted_at: Instant::now(),
        });
        Ok(token)
    }

    async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
        debug!("Cached developer token invalidated");
    }
}
