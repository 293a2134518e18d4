use super::{types::Config, ConfigError, MAX_ADD_TRACKS_BATCH};

/// Validate configuration
///
/// Rejects zero rate limits, windows, timeouts, page/batch sizes and worker
/// counts, batches above the provider maximum, and thresholds outside
/// `[0, 2]` (the album bonus lets scores exceed 1.0).
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let spotify = &config.spotify;
    non_zero("spotify.rate_limit_requests", spotify.rate_limit_requests as u64)?;
    non_zero("spotify.rate_limit_window_secs", spotify.rate_limit_window_secs)?;
    non_zero("spotify.timeout_secs", spotify.timeout_secs)?;
    non_zero("spotify.page_size", spotify.page_size as u64)?;

    let apple = &config.apple_music;
    non_zero("apple_music.rate_limit_requests", apple.rate_limit_requests as u64)?;
    non_zero("apple_music.rate_limit_window_secs", apple.rate_limit_window_secs)?;
    non_zero("apple_music.timeout_secs", apple.timeout_secs)?;
    non_zero("apple_music.add_tracks_batch_size", apple.add_tracks_batch_size as u64)?;
    if apple.add_tracks_batch_size > MAX_ADD_TRACKS_BATCH {
        return Err(ConfigError::ValidationError(format!(
            "apple_music.add_tracks_batch_size cannot exceed {}",
            MAX_ADD_TRACKS_BATCH
        )));
    }
    if apple.storefront.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "apple_music.storefront cannot be empty".to_string(),
        ));
    }
    let signing_parts = [
        apple.key_id.is_some(),
        apple.team_id.is_some(),
        apple.private_key_path.is_some(),
    ];
    if signing_parts.contains(&true) && apple.signing_key().is_none() {
        return Err(ConfigError::ValidationError(
            "apple_music.key_id, team_id and private_key_path must be set together".to_string(),
        ));
    }

    let resolver = &config.resolver;
    non_zero("resolver.candidate_limit", resolver.candidate_limit as u64)?;
    if !(0.0..=2.0).contains(&resolver.match_threshold) {
        return Err(ConfigError::ValidationError(
            "resolver.match_threshold must be between 0 and 2".to_string(),
        ));
    }

    let orchestrator = &config.orchestrator;
    non_zero("orchestrator.workers", orchestrator.workers as u64)?;
    non_zero("orchestrator.queue_capacity", orchestrator.queue_capacity as u64)?;
    non_zero("orchestrator.history_limit", orchestrator.history_limit as u64)?;
    if orchestrator.history_retention < orchestrator.history_limit {
        return Err(ConfigError::ValidationError(
            "orchestrator.history_retention cannot be below history_limit".to_string(),
        ));
    }

    Ok(())
}

fn non_zero(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ValidationError(format!("{} cannot be 0", key)));
    }
    Ok(())
}
