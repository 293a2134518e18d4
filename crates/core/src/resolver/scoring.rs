//! Candidate scoring.

use crate::catalog::Track;

use super::{ResolverConfig, TrackQuery};

/// Case-insensitive similarity in `[0, 1]` (normalized Levenshtein).
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Weighted title/artist similarity plus the album bonus.
///
/// The bonus applies only when both the query and the candidate name an
/// album.
pub fn score_candidate(query: &TrackQuery, candidate: &Track, config: &ResolverConfig) -> f64 {
    let title = similarity(&query.title, &candidate.name);
    let artist = similarity(&query.artist, &candidate.artist);
    let mut score = config.title_weight * title + config.artist_weight * artist;

    if let Some(album) = query.album.as_deref().filter(|a| !a.is_empty()) {
        if !candidate.album.is_empty() {
            score += config.album_bonus_weight * similarity(album, &candidate.album);
        }
    }

    score
}

/// Highest-scoring candidate strictly above the threshold.
///
/// Equal scores keep the earliest candidate.
pub fn find_best_match<'a>(
    candidates: &'a [Track],
    query: &TrackQuery,
    config: &ResolverConfig,
) -> Option<(&'a Track, f64)> {
    let mut best: Option<(&Track, f64)> = None;

    for candidate in candidates {
        let score = score_candidate(query, candidate, config);
        if score <= config.match_threshold {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }

    best
}
