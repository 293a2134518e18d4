//! Apple Music developer tokens signed from a MusicKit private key.
//!
//! Tokens are ES256 JWTs carrying the key ID in the header and the team ID
//! as issuer. Pair with [`CachedCredentialProvider`](super::CachedCredentialProvider),
//! which reuses a token for [`DEVELOPER_TOKEN_TTL`](super::DEVELOPER_TOKEN_TTL)
//! and mints a new one after a 401.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CatalogError, TokenSource};

/// Lifetime written into each token's `exp` claim.
pub const DEVELOPER_TOKEN_LIFETIME_SECS: i64 = 6 * 60 * 60;

/// Audience claim expected by Apple's token verifier.
pub const DEVELOPER_TOKEN_AUDIENCE: &str = "appstoreconnect-v1";

/// Claims of a developer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperTokenClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
}

/// Signs developer tokens with a MusicKit key.
pub struct JwtTokenSource {
    key_id: String,
    team_id: String,
    key: EncodingKey,
}

impl JwtTokenSource {
    /// Build a signer from a PEM-encoded (PKCS#8) P-256 private key.
    pub fn new(
        key_id: impl Into<String>,
        team_id: impl Into<String>,
        private_key_pem: &[u8],
    ) -> Result<Self, CatalogError> {
        let key_id = key_id.into();
        let team_id = team_id.into();
        if key_id.is_empty() || team_id.is_empty() {
            return Err(CatalogError::Authentication(
                "Apple Music key ID and team ID are required".to_string(),
            ));
        }

        let key = EncodingKey::from_ec_pem(private_key_pem).map_err(|e| {
            CatalogError::Authentication(format!("Invalid Apple Music private key: {}", e))
        })?;

        Ok(Self {
            key_id,
            team_id,
            key,
        })
    }

    /// Build a signer from a `.p8` key file.
    pub fn from_key_file(
        key_id: impl Into<String>,
        team_id: impl Into<String>,
        path: &Path,
    ) -> Result<Self, CatalogError> {
        let pem = std::fs::read(path).map_err(|e| {
            CatalogError::Authentication(format!(
                "Failed to read Apple Music private key {:?}: {}",
                path, e
            ))
        })?;
        Self::new(key_id, team_id, &pem)
    }

    fn claims(&self) -> DeveloperTokenClaims {
        let iat = Utc::now().timestamp();
        DeveloperTokenClaims {
            iss: self.team_id.clone(),
            iat,
            exp: iat + DEVELOPER_TOKEN_LIFETIME_SECS,
            aud: DEVELOPER_TOKEN_AUDIENCE.to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for JwtTokenSource {
    async fn mint(&self) -> Result<String, CatalogError> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &self.claims(), &self.key).map_err(|e| {
            CatalogError::Authentication(format!("Failed to sign developer token: {}", e))
        })?;
        debug!("Signed developer token with key {}", self.key_id);
        Ok(token)
    }
}
