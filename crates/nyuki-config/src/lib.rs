//! # nyuki-config
//!
//! Layered configuration loading for Nyuki using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`NYUKI_*` prefix, `__` as separator)
//! 2. Project-level `.nyuki/config.toml`
//! 3. User-level `~/.config/nyuki/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `NYUKI_BACKEND__DATABASE_PATH` -> `backend.database_path`,
//! `NYUKI_SYNC__REQUEST_TIMEOUT_MS` -> `sync.request_timeout_ms`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use nyuki_config::NyukiConfig;
//!
//! let config = NyukiConfig::load_with_dotenv().expect("config");
//! println!("database: {}", config.backend.database_path);
//! ```

mod backend;
mod error;
mod general;
mod session;
mod sync;

pub use backend::BackendConfig;
pub use error::ConfigError;
pub use general::GeneralConfig;
pub use session::SessionConfig;
pub use sync::SyncConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NyukiConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl NyukiConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be parsed or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be parsed or a value is invalid.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".nyuki/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("NYUKI_").split("__"))
    }

    /// Reject values that would make the core misbehave at runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.restore_timeout_ms == 0 {
            return Err(invalid("session.restore_timeout_ms", "must be greater than zero"));
        }
        if self.sync.request_timeout_ms == 0 {
            return Err(invalid("sync.request_timeout_ms", "must be greater than zero"));
        }
        if self.backend.token_ttl_secs <= self.session.expiry_buffer_secs {
            return Err(invalid(
                "backend.token_ttl_secs",
                "must exceed session.expiry_buffer_secs",
            ));
        }
        if self.backend.database_path.is_empty() {
            return Err(invalid("backend.database_path", "must not be empty"));
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nyuki").join("config.toml"))
    }

    /// Load `.env` from the workspace root, walking up from `CARGO_MANIFEST_DIR`.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
