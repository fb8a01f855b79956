//! Embedded backend configuration.

use serde::{Deserialize, Serialize};

const fn default_token_ttl_secs() -> i64 {
    60 * 60 * 24 * 7
}

fn default_database_path() -> String {
    ".nyuki/nyuki.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Path of the libSQL database file, or `":memory:"`.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Secret used to sign session tokens. Empty means a per-process random secret.
    #[serde(default)]
    pub token_secret: String,

    /// Lifetime of issued session tokens.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,

    /// Whether new accounts must confirm their email before signing in.
    #[serde(default)]
    pub require_email_verification: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            token_secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
            require_email_verification: false,
        }
    }
}

impl BackendConfig {
    /// Whether tokens survive a process restart (a fixed secret is configured).
    pub fn has_stable_secret(&self) -> bool {
        !self.token_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = BackendConfig::default();
        assert_eq!(config.database_path, ".nyuki/nyuki.db");
        assert_eq!(config.token_ttl_secs, 604_800);
        assert!(!config.require_email_verification);
        assert!(!config.has_stable_secret());
    }
}
