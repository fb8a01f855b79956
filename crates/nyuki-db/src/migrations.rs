//! Embedded schema migrations. Every statement is `IF NOT EXISTS`, so
//! re-running on an existing database is a no-op.

use crate::NyukiDb;
use crate::error::DatabaseError;

/// Accounts, sessions, profiles, apiaries, hives.
const MIGRATION_001: &str = include_str!("../migrations/001_initial.sql");

impl NyukiDb {
    pub(crate) async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(MIGRATION_001)
            .await
            .map_err(|e| DatabaseError::Migration(format!("001_initial: {e}")))?;
        Ok(())
    }
}
