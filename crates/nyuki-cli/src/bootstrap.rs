//! Configuration for one CLI invocation.

use std::path::{Path, PathBuf};

use anyhow::Context;
use nyuki_config::NyukiConfig;
use nyuki_core::ids::random_hex;

use crate::cli::GlobalFlags;

const SECRET_FILE_NAME: &str = "token.secret";

pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<NyukiConfig> {
    let mut config = NyukiConfig::load_with_dotenv().context("failed to load nyuki config")?;
    if let Some(database) = &flags.database {
        config.backend.database_path.clone_from(database);
    }
    ensure_token_secret(&mut config)?;
    Ok(config)
}

/// Every CLI run is a new process, so a per-process signing key would make
/// every stored session unusable. Without a configured secret, keep one next
/// to the database.
fn ensure_token_secret(config: &mut NyukiConfig) -> anyhow::Result<()> {
    if config.backend.has_stable_secret() || config.backend.database_path == ":memory:" {
        return Ok(());
    }
    let path = secret_path(Path::new(&config.backend.database_path));
    config.backend.token_secret = load_or_create_secret(&path)?;
    Ok(())
}

fn secret_path(database: &Path) -> PathBuf {
    database
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(SECRET_FILE_NAME)
}

fn load_or_create_secret(path: &Path) -> anyhow::Result<String> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let secret = random_hex(32);
    std::fs::write(path, &secret)
        .with_context(|| format!("failed to write token secret to {}", path.display()))?;
    tracing::debug!(path = %path.display(), "generated token secret");
    Ok(secret)
}
