//! Resolver configuration.

use serde::{Deserialize, Serialize};

/// Weights and limits for cross-catalog matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Candidates requested per text search.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: u32,

    /// A candidate must score strictly above this to be accepted.
    #[serde(default = "default_threshold")]
    pub match_threshold: f64,

    #[serde(default = "default_title_weight")]
    pub title_weight: f64,

    #[serde(default = "default_artist_weight")]
    pub artist_weight: f64,

    /// Added on top of the weighted sum when both sides name an album,
    /// so scores may exceed 1.0.
    #[serde(default = "default_album_bonus")]
    pub album_bonus_weight: f64,
}

fn default_candidate_limit() -> u32 {
    10
}

fn default_threshold() -> f64 {
    0.7
}

fn default_title_weight() -> f64 {
    0.6
}

fn default_artist_weight() -> f64 {
    0.4
}

fn default_album_bonus() -> f64 {
    0.2
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            match_threshold: default_threshold(),
            title_weight: default_title_weight(),
            artist_weight: default_artist_weight(),
            album_bonus_weight: default_album_bonus(),
        }
    }
}
