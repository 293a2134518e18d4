//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the sync orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Sync tasks processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Jobs that may wait for a free worker before `start_sync` blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Pause between consecutive tracks of one task (milliseconds).
    /// Applied on top of the catalog rate limiters.
    #[serde(default = "default_track_delay")]
    pub track_delay_ms: u64,

    /// History entries returned per query.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// History entries kept per user.
    #[serde(default = "default_history_retention")]
    pub history_retention: usize,
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_track_delay() -> u64 {
    100
}

fn default_history_limit() -> usize {
    50
}

fn default_history_retention() -> usize {
    100
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            track_delay_ms: default_track_delay(),
            history_limit: default_history_limit(),
            history_retention: default_history_retention(),
        }
    }
}
