//! The contract every synchronized entity implements.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::enums::Collection;
use crate::errors::CoreError;

/// A server-owned record that the client keeps a synchronized copy of.
///
/// The backend assigns `version`, a per-record counter bumped on every write.
/// `client_ref` is the correlation id of the optimistic create that produced
/// the record, echoed back by the backend so pushed inserts can be matched to
/// placeholders.
pub trait SyncRecord:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Input for a create.
    type Draft: Clone + fmt::Debug + Serialize + Send + Sync + 'static;
    /// Partial update applied both optimistically and by the backend.
    type Patch: Clone + fmt::Debug + Serialize + Send + Sync + 'static;

    const COLLECTION: Collection;

    fn id(&self) -> &str;
    fn owner_id(&self) -> &str;
    fn version(&self) -> i64;
    fn client_ref(&self) -> Option<&str>;
    fn created_at(&self) -> DateTime<Utc>;

    /// Local stand-in shown while the create is in flight.
    fn placeholder(owner_id: &str, client_ref: &str, draft: &Self::Draft, now: DateTime<Utc>)
    -> Self;

    /// Apply `patch` in place. Does not touch `version`.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Reject drafts missing required fields before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` describing the first invalid field.
    fn validate_draft(draft: &Self::Draft) -> Result<(), CoreError>;
}
