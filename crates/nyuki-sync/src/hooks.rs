use async_trait::async_trait;
use nyuki_core::record::SyncRecord;

use crate::error::WriteError;

/// A write that the backend has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Committed<E> {
    Created(E),
    Updated {
        /// The stored record just before the update ran, as the backend saw it.
        before: E,
        after: E,
    },
    /// The record as the backend held it when it was removed.
    Deleted(E),
}

/// Store-level extension point for cross-entity rules.
///
/// The checks run synchronously at call time, before any optimistic change.
/// `after_commit` runs once per committed write, before the caller's
/// `PendingWrite` resolves.
#[async_trait]
pub trait WriteHook<E: SyncRecord>: Send + Sync {
    /// # Errors
    ///
    /// A `WriteError` vetoes the create.
    fn check_create(&self, _draft: &E::Draft) -> Result<(), WriteError> {
        Ok(())
    }

    /// # Errors
    ///
    /// A `WriteError` vetoes the update.
    fn check_update(&self, _current: &E, _patch: &E::Patch) -> Result<(), WriteError> {
        Ok(())
    }

    async fn after_commit(&self, committed: &Committed<E>);
}
