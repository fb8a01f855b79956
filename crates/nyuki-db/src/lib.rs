//! # nyuki-db
//!
//! Embedded libSQL backend for Nyuki.
//!
//! Stores accounts, sessions, profiles, apiaries and hives in a local libSQL
//! database and implements every backend trait the sync core talks to:
//! `AuthBackend`, `CollectionBackend` for both collections, `CounterBackend`
//! and `ChangeFeed`. Committed mutations are fanned out in-process to the
//! change-feed subscribers of the owning user.

mod auth;
mod backend;
pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod service;
pub mod tokens;

use error::DatabaseError;
use libsql::Builder;

pub use service::NyukiService;

/// Database handle: a libSQL database and its single connection.
pub struct NyukiDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl NyukiDb {
    /// Open a local database at `path` (or `":memory:"`), running migrations.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Per-connection in SQLite.
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let nyuki_db = Self { db, conn };
        nyuki_db.run_migrations().await?;
        Ok(nyuki_db)
    }

    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }
}
