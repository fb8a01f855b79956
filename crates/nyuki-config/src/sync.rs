//! Entity store and change-feed configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_request_timeout_ms() -> u64 {
    10_000
}

const fn default_discard_log_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Upper bound on a single backend call made by an entity store.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How many discarded remote events each store keeps for inspection.
    #[serde(default = "default_discard_log_capacity")]
    pub discard_log_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            discard_log_capacity: default_discard_log_capacity(),
        }
    }
}

impl SyncConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
