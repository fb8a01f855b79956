//! Routes a backend change feed into one entity store.
//!
//! At most one feed is open per bridge, scoped to a single owner. The bridge
//! never touches records itself: every event goes through
//! [`EntityStore`]'s version rule, tagged with the store epoch captured when
//! the feed was opened.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use nyuki_auth::SessionScoped;
use nyuki_core::events::ChangeEvent;
use nyuki_core::record::SyncRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::{ChangeFeed, FeedId};
use crate::error::{ConflictDiscard, FetchError};
use crate::store::EntityStore;

#[derive(Default)]
struct Subscription {
    owner_id: Option<String>,
    feed_id: Option<FeedId>,
    task: Option<JoinHandle<()>>,
    /// Bumped by every open/close so a superseded `open` can tell.
    generation: u64,
}

pub struct SubscriptionBridge<E: SyncRecord> {
    feed: Arc<dyn ChangeFeed<E>>,
    store: EntityStore<E>,
    subscribe_timeout: Duration,
    state: Mutex<Subscription>,
}

impl<E: SyncRecord> SubscriptionBridge<E> {
    #[must_use]
    pub fn new(feed: Arc<dyn ChangeFeed<E>>, store: EntityStore<E>, subscribe_timeout: Duration) -> Self {
        Self {
            feed,
            store,
            subscribe_timeout,
            state: Mutex::new(Subscription::default()),
        }
    }

    /// Open the feed for `owner_id`. A no-op if it is already open for that
    /// owner; a feed for another owner is closed first.
    ///
    /// The store must already be attached to `owner_id`.
    ///
    /// # Errors
    ///
    /// `FetchError` if the backend refuses or does not answer the
    /// subscription, or `TornDown` if the store is not attached to
    /// `owner_id` or the bridge was closed meanwhile.
    pub async fn open(&self, owner_id: &str) -> Result<(), FetchError> {
        let (generation, epoch) = {
            let mut state = self.lock();
            if state.owner_id.as_deref() == Some(owner_id) && state.task.is_some() {
                return Ok(());
            }
            self.close_locked(&mut state);
            let Some(epoch) = self.store.epoch_for(owner_id) else {
                return Err(FetchError::TornDown);
            };
            (state.generation, epoch)
        };

        let handle = match tokio::time::timeout(self.subscribe_timeout, self.feed.subscribe(owner_id)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(error)) => return Err(error.into()),
            Err(_) => return Err(FetchError::Timeout),
        };

        let mut state = self.lock();
        if state.generation != generation {
            // Closed or reopened while subscribing.
            self.feed.unsubscribe(handle.id);
            return Err(FetchError::TornDown);
        }
        let task = tokio::spawn(forward(self.store.clone(), epoch, handle.events));
        state.owner_id = Some(owner_id.to_string());
        state.feed_id = Some(handle.id);
        state.task = Some(task);
        tracing::debug!(collection = %E::COLLECTION, owner_id, feed_id = handle.id, "change feed opened");
        Ok(())
    }

    /// Unsubscribe and abort the forwarding task before returning.
    pub fn close(&self) {
        let mut state = self.lock();
        self.close_locked(&mut state);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().task.is_some()
    }

    #[must_use]
    pub fn owner_id(&self) -> Option<String> {
        self.lock().owner_id.clone()
    }

    fn close_locked(&self, state: &mut Subscription) {
        state.generation += 1;
        if let Some(feed_id) = state.feed_id.take() {
            self.feed.unsubscribe(feed_id);
            tracing::debug!(collection = %E::COLLECTION, feed_id, "change feed closed");
        }
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.owner_id = None;
    }

    fn lock(&self) -> MutexGuard<'_, Subscription> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn forward<E: SyncRecord>(
    store: EntityStore<E>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<ChangeEvent<E>>,
) {
    while let Some(event) = events.recv().await {
        if let Err(ConflictDiscard::Detached { .. }) = store.deliver(Some(epoch), event) {
            break;
        }
    }
}

impl<E: SyncRecord> SessionScoped for SubscriptionBridge<E> {
    fn teardown(&self) {
        self.close();
    }
}

impl<E: SyncRecord> Drop for SubscriptionBridge<E> {
    fn drop(&mut self) {
        self.close();
    }
}
