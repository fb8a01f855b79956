//! Session manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_restore_timeout_ms() -> u64 {
    5_000
}

const fn default_expiry_buffer_secs() -> i64 {
    60
}

fn default_keyring_service() -> String {
    "nyuki".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Upper bound on how long restoration, sign-in, sign-up, sign-out, or a
    /// profile load may wait on the backend.
    #[serde(default = "default_restore_timeout_ms")]
    pub restore_timeout_ms: u64,

    /// Persisted tokens expiring within this window are treated as absent.
    #[serde(default = "default_expiry_buffer_secs")]
    pub expiry_buffer_secs: i64,

    /// OS keychain service name the session token is stored under.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restore_timeout_ms: default_restore_timeout_ms(),
            expiry_buffer_secs: default_expiry_buffer_secs(),
            keyring_service: default_keyring_service(),
        }
    }
}

impl SessionConfig {
    pub const fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }
}
