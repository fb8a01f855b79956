//! [`NyukiService`]: the database plus everything a backend needs around it.
//!
//! Repo methods live in `repos/` as `impl NyukiService` blocks. Mutations of
//! apiaries and hives run under a write gate so that each commit and the
//! change event describing it reach subscribers in commit order.

use std::path::Path;

use chrono::TimeDelta;
use nyuki_config::BackendConfig;
use nyuki_core::entities::{Apiary, Hive};
use nyuki_core::events::ChangeEvent;
use nyuki_sync::FeedRegistry;
use tokio::sync::{Mutex, MutexGuard};

use crate::NyukiDb;
use crate::error::DatabaseError;
use crate::tokens::TokenSigner;

pub struct NyukiService {
    db: NyukiDb,
    signer: TokenSigner,
    token_ttl: TimeDelta,
    require_email_verification: bool,
    apiary_feed: FeedRegistry<Apiary>,
    hive_feed: FeedRegistry<Hive>,
    writes: Mutex<()>,
}

impl NyukiService {
    /// Open the database named by `config.database_path`, creating its
    /// parent directory if needed, and drop sessions that have expired.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// database cannot be opened, or migrations fail.
    pub async fn open(config: &BackendConfig) -> Result<Self, DatabaseError> {
        let path = config.database_path.as_str();
        if path != ":memory:"
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Other(anyhow::anyhow!(
                    "create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let db = NyukiDb::open_local(path).await?;
        let service = Self::from_db(db, config)?;
        service.purge_expired_sessions().await?;
        Ok(service)
    }

    /// Wrap an already opened database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the token signer cannot be keyed.
    pub fn from_db(db: NyukiDb, config: &BackendConfig) -> Result<Self, DatabaseError> {
        Ok(Self {
            db,
            signer: TokenSigner::new(&config.token_secret)?,
            token_ttl: TimeDelta::seconds(config.token_ttl_secs),
            require_email_verification: config.require_email_verification,
            apiary_feed: FeedRegistry::new(),
            hive_feed: FeedRegistry::new(),
            writes: Mutex::new(()),
        })
    }

    #[must_use]
    pub const fn db(&self) -> &NyukiDb {
        &self.db
    }

    pub(crate) const fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub(crate) const fn token_ttl(&self) -> TimeDelta {
        self.token_ttl
    }

    pub(crate) const fn require_email_verification(&self) -> bool {
        self.require_email_verification
    }

    pub(crate) const fn apiary_feed(&self) -> &FeedRegistry<Apiary> {
        &self.apiary_feed
    }

    pub(crate) const fn hive_feed(&self) -> &FeedRegistry<Hive> {
        &self.hive_feed
    }

    /// Serializes apiary and hive mutations with their event publication.
    pub(crate) async fn write_gate(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    pub(crate) fn publish_apiary(&self, owner_id: &str, event: &ChangeEvent<Apiary>) {
        self.apiary_feed.publish(owner_id, event);
    }

    pub(crate) fn publish_hive(&self, owner_id: &str, event: &ChangeEvent<Hive>) {
        self.hive_feed.publish(owner_id, event);
    }
}
