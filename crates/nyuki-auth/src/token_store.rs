//! Persistence of the session token across restarts.
//!
//! The token is the only client-side state that survives a restart; entity
//! caches are rebuilt from the backend every session.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::AuthError;

const KEYRING_USER: &str = "session-token";
const CREDENTIALS_FILE_NAME: &str = "credentials";
const TOKEN_ENV_VAR: &str = "NYUKI_AUTH__TOKEN";

/// Where a persisted session token lives.
pub trait TokenStore: Send + Sync {
    /// Persist `token`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStoreError` if the token cannot be written.
    fn store(&self, token: &str) -> Result<(), AuthError>;

    /// The persisted token, if any.
    fn load(&self) -> Option<String>;

    /// Remove the persisted token. Removing an absent token is not an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStoreError` if an existing token cannot be removed.
    fn delete(&self) -> Result<(), AuthError>;
}

// ---------------------------------------------------------------------------
// Keyring (production)
// ---------------------------------------------------------------------------

/// OS keychain store with an env-var override and a credentials-file fallback.
///
/// Load priority: keyring → `NYUKI_AUTH__TOKEN` → file (`~/.nyuki/credentials`).
pub struct KeyringTokenStore {
    service: String,
    file: FileTokenStore,
}

impl KeyringTokenStore {
    /// Store under keychain `service`, falling back to `~/.nyuki/credentials`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStoreError` if the home directory cannot be resolved.
    pub fn new(service: impl Into<String>) -> Result<Self, AuthError> {
        Ok(Self {
            service: service.into(),
            file: FileTokenStore::in_home()?,
        })
    }

    /// Which tier the current token came from (for status display).
    #[must_use]
    pub fn detect_source(&self) -> Option<&'static str> {
        if self.keyring_entry().is_some_and(|entry| {
            entry.get_password().is_ok_and(|t| !t.is_empty())
        }) {
            return Some("keyring");
        }
        if std::env::var(TOKEN_ENV_VAR).is_ok_and(|t| !t.is_empty()) {
            return Some("env");
        }
        if self.file.load().is_some() {
            return Some("file");
        }
        None
    }

    fn keyring_entry(&self) -> Option<keyring::Entry> {
        keyring::Entry::new(&self.service, KEYRING_USER).ok()
    }
}

impl TokenStore for KeyringTokenStore {
    fn store(&self, token: &str) -> Result<(), AuthError> {
        match keyring::Entry::new(&self.service, KEYRING_USER) {
            Ok(entry) => match entry.set_password(token) {
                Ok(()) => Ok(()),
                Err(error) => {
                    tracing::warn!(%error, "keyring store failed; falling back to file");
                    self.file.store(token)
                }
            },
            Err(error) => {
                tracing::warn!(%error, "keyring unavailable; falling back to file");
                self.file.store(token)
            }
        }
    }

    fn load(&self) -> Option<String> {
        if let Some(entry) = self.keyring_entry()
            && let Ok(token) = entry.get_password()
            && !token.is_empty()
        {
            return Some(token);
        }

        if let Ok(token) = std::env::var(TOKEN_ENV_VAR)
            && !token.is_empty()
        {
            return Some(token);
        }

        self.file.load()
    }

    fn delete(&self) -> Result<(), AuthError> {
        // May not exist; the file removal below reports real failures.
        if let Some(entry) = self.keyring_entry() {
            let _ = entry.delete_credential();
        }
        self.file.delete()
    }
}

// ---------------------------------------------------------------------------
// Credentials file
// ---------------------------------------------------------------------------

/// Token kept in a single `0600` file inside a `0700` directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.nyuki/credentials`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenStoreError` if the home directory cannot be resolved.
    pub fn in_home() -> Result<Self, AuthError> {
        dirs::home_dir()
            .map(|h| Self::new(h.join(".nyuki").join(CREDENTIALS_FILE_NAME)))
            .ok_or_else(|| {
                AuthError::TokenStoreError(
                    "home directory not found — cannot store credentials".into(),
                )
            })
    }

    #[must_use]
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn store(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::TokenStoreError(format!("mkdir {}: {e}", parent.display()))
            })?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(parent, fs::Permissions::from_mode(0o700)) {
                    tracing::warn!("failed to chmod 0700 {}: {e}", parent.display());
                }
            }
        }
        fs::write(&self.path, token).map_err(|e| {
            AuthError::TokenStoreError(format!("write {}: {e}", self.path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                AuthError::TokenStoreError(format!("chmod {}: {e}", self.path.display()))
            })?;
        }

        Ok(())
    }

    fn load(&self) -> Option<String> {
        fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn delete(&self) -> Result<(), AuthError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                AuthError::TokenStoreError(format!("failed to delete {}: {e}", self.path.display()))
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn store(&self, token: &str) -> Result<(), AuthError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn load(&self) -> Option<String> {
        self.slot().clone()
    }

    fn delete(&self) -> Result<(), AuthError> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_credentials_path_is_under_dot_nyuki() {
        let store = FileTokenStore::in_home().expect("should resolve");
        assert!(store.path().ends_with(".nyuki/credentials"));
    }

    #[test]
    fn file_store_load_delete_cycle() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let store = FileTokenStore::new(tmp.path().join("nested").join("credentials"));

        store.store("test_token_abc123").expect("store");
        assert_eq!(store.load().as_deref(), Some("test_token_abc123"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path())
                .expect("metadata")
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o600, "credentials file should be 0600");
        }

        store.delete().expect("delete");
        assert!(!store.path().exists());
        assert!(store.load().is_none());
        store.delete().expect("deleting twice is fine");
    }

    #[test]
    fn file_store_ignores_whitespace_only_content() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let store = FileTokenStore::new(tmp.path().join("credentials"));
        std::fs::write(store.path(), "   \n  ").expect("write");
        assert!(store.load().is_none(), "whitespace-only should return None");
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::default();
        assert!(store.load().is_none());
        store.store("abc").unwrap();
        assert_eq!(store.load().as_deref(), Some("abc"));
        store.delete().unwrap();
        assert!(store.load().is_none());
    }
}
