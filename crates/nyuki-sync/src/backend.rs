//! The data half of the backend contract.
//!
//! Authentication lives in `nyuki_auth::AuthBackend`; these traits cover
//! collection CRUD, the hive counter RPC, and push subscriptions. Every call is
//! scoped by the owning user's id.

use async_trait::async_trait;
use nyuki_core::entities::Apiary;
use nyuki_core::errors::BackendError;
use nyuki_core::events::ChangeEvent;
use nyuki_core::record::SyncRecord;
use tokio::sync::mpsc;

#[async_trait]
pub trait CollectionBackend<E: SyncRecord>: Send + Sync {
    /// All records owned by `owner_id`.
    async fn list(&self, owner_id: &str) -> Result<Vec<E>, BackendError>;

    /// Insert a record. The backend echoes `client_ref` on the stored record.
    async fn create(
        &self,
        owner_id: &str,
        draft: &E::Draft,
        client_ref: &str,
    ) -> Result<E, BackendError>;

    /// Apply `patch`, returning the stored record both before and after the
    /// write.
    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: &E::Patch,
    ) -> Result<Revision<E>, BackendError>;

    /// Remove a record, returning it as it was stored at removal time.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<Removal<E>, BackendError>;
}

/// An update as the backend committed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision<E> {
    pub before: E,
    pub after: E,
}

/// A deletion as the backend committed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal<E> {
    /// The last stored state of the record.
    pub record: E,
    /// The version the deletion was committed at.
    pub version: i64,
}

/// Atomic server-side maintenance of `Apiary::total_hives`.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    async fn increment_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError>;

    /// # Errors
    ///
    /// `Rejected` when the counter is already zero; it never goes negative.
    async fn decrement_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError>;

    /// Reset `total_hives` to the number of hives the apiary holds right now.
    async fn recount_hives(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError>;
}

pub type FeedId = u64;

/// A live subscription. Events arrive on `events` until the feed is
/// unsubscribed or the backend drops the sender.
#[derive(Debug)]
pub struct FeedHandle<E> {
    pub id: FeedId,
    pub events: mpsc::UnboundedReceiver<ChangeEvent<E>>,
}

#[async_trait]
pub trait ChangeFeed<E: SyncRecord>: Send + Sync {
    async fn subscribe(&self, owner_id: &str) -> Result<FeedHandle<E>, BackendError>;

    /// Stop delivery for `id`. Must not block; unknown ids are ignored.
    fn unsubscribe(&self, id: FeedId);
}
