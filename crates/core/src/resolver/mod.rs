//! Cross-catalog track resolution.
//!
//! A source track is looked up in the destination catalog with ordered
//! fallback strategies, each tried only when the previous produced nothing:
//!
//! 1. **ISRC**: search `isrc:{code}` and take the first hit unconditionally.
//! 2. **Artist + title**: free-text search, best candidate by score.
//! 3. **Artist only**, then **title only**: same scoring.
//!
//! Search failures inside a strategy are logged and treated as "no result";
//! only exhausting every strategy fails, with
//! [`CatalogError::TrackNotFound`].

mod config;
mod scoring;

pub use config::ResolverConfig;
pub use scoring::{find_best_match, score_candidate, similarity};

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, DestinationCatalog, Track};
use crate::metrics;

/// Strategy that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Isrc,
    ArtistTitle,
    ArtistOnly,
    TitleOnly,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Isrc => "isrc",
            MatchStrategy::ArtistTitle => "artist_title",
            MatchStrategy::ArtistOnly => "artist_only",
            MatchStrategy::TitleOnly => "title_only",
        }
    }
}

/// What we know about the track being looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackQuery {
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub isrc: Option<String>,
}

impl From<&Track> for TrackQuery {
    fn from(track: &Track) -> Self {
        Self {
            artist: track.artist.clone(),
            title: track.name.clone(),
            album: Some(track.album.clone()).filter(|a| !a.is_empty()),
            isrc: track.isrc.clone(),
        }
    }
}

/// A destination track accepted for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub track: Track,
    pub strategy: MatchStrategy,
    /// Scorer result; `None` for identifier matches, which bypass scoring.
    pub score: Option<f64>,
}

/// Two-letter country, three-character registrant, seven digits.
static ISRC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}[0-9]{7}$").unwrap());

/// Canonical ISRC (uppercase, hyphens removed), or `None` if malformed.
pub fn normalize_isrc(raw: &str) -> Option<String> {
    let candidate: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_uppercase();

    ISRC_PATTERN.is_match(&candidate).then_some(candidate)
}

/// Run every strategy against `catalog` for one query.
pub async fn resolve_with(
    catalog: &dyn DestinationCatalog,
    config: &ResolverConfig,
    query: &TrackQuery,
    user_credential: Option<&str>,
) -> Result<ResolvedTrack, CatalogError> {
    let label = format!("{} - {}", query.artist, query.title);

    if let Some(resolved) = search_isrc(catalog, query, user_credential).await {
        return Ok(matched(&label, resolved));
    }

    let combined = format!("{} {}", query.artist, query.title);
    let attempts = [
        (MatchStrategy::ArtistTitle, combined.trim()),
        (MatchStrategy::ArtistOnly, query.artist.trim()),
        (MatchStrategy::TitleOnly, query.title.trim()),
    ];

    for (strategy, term) in attempts {
        if term.is_empty() {
            continue;
        }
        if let Some(resolved) =
            search_scored(catalog, config, query, strategy, term, user_credential).await
        {
            return Ok(matched(&label, resolved));
        }
    }

    info!("No match found on {} for '{}'", catalog.name(), label);
    metrics::TRACK_MATCHES.with_label_values(&["none"]).inc();
    Err(CatalogError::TrackNotFound(label))
}

async fn search_isrc(
    catalog: &dyn DestinationCatalog,
    query: &TrackQuery,
    user_credential: Option<&str>,
) -> Option<ResolvedTrack> {
    let raw = query.isrc.as_deref().filter(|i| !i.trim().is_empty())?;
    let Some(isrc) = normalize_isrc(raw) else {
        debug!("Skipping ISRC search, malformed code '{}'", raw);
        return None;
    };

    match catalog
        .search(&format!("isrc:{}", isrc), 1, user_credential)
        .await
    {
        Ok(results) => results.into_iter().next().map(|track| ResolvedTrack {
            track,
            strategy: MatchStrategy::Isrc,
            score: None,
        }),
        Err(e) => {
            warn!("ISRC search failed for {}: {}", isrc, e);
            None
        }
    }
}

async fn search_scored(
    catalog: &dyn DestinationCatalog,
    config: &ResolverConfig,
    query: &TrackQuery,
    strategy: MatchStrategy,
    term: &str,
    user_credential: Option<&str>,
) -> Option<ResolvedTrack> {
    let candidates = match catalog
        .search(term, config.candidate_limit, user_credential)
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("{} search failed for '{}': {}", strategy.as_str(), term, e);
            return None;
        }
    };

    debug!(
        "{} search for '{}' returned {} candidates",
        strategy.as_str(),
        term,
        candidates.len()
    );

    find_best_match(&candidates, query, config).map(|(track, score)| ResolvedTrack {
        track: track.clone(),
        strategy,
        score: Some(score),
    })
}

fn matched(label: &str, resolved: ResolvedTrack) -> ResolvedTrack {
    debug!(
        "Matched '{}' to {} via {} (score {:?})",
        label,
        resolved.track.id,
        resolved.strategy.as_str(),
        resolved.score
    );
    metrics::TRACK_MATCHES
        .with_label_values(&[resolved.strategy.as_str()])
        .inc();
    resolved
}

/// Resolves source tracks against one destination catalog.
pub struct TrackResolver {
    catalog: Arc<dyn DestinationCatalog>,
    config: ResolverConfig,
}

impl TrackResolver {
    pub fn new(catalog: Arc<dyn DestinationCatalog>, config: ResolverConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Find the destination counterpart of `track`.
    pub async fn resolve(
        &self,
        track: &Track,
        user_credential: Option<&str>,
    ) -> Result<ResolvedTrack, CatalogError> {
        let query = TrackQuery::from(track);
        resolve_with(self.catalog.as_ref(), &self.config, &query, user_credential).await
    }
}
