//! In-process fan-out of change events, for backends that run in the same
//! process as the client (the embedded database and the test backend).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use nyuki_core::events::ChangeEvent;
use nyuki_core::record::SyncRecord;
use tokio::sync::mpsc;

use crate::backend::{FeedHandle, FeedId};

struct Subscriber<E> {
    owner_id: String,
    tx: mpsc::UnboundedSender<ChangeEvent<E>>,
}

pub struct FeedRegistry<E> {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<FeedId, Subscriber<E>>>,
}

impl<E> Default for FeedRegistry<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }
}

impl<E: SyncRecord> FeedRegistry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, owner_id: &str) -> FeedHandle<E> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, events) = mpsc::unbounded_channel();
        self.lock().insert(
            id,
            Subscriber {
                owner_id: owner_id.to_string(),
                tx,
            },
        );
        tracing::debug!(feed_id = id, owner_id, collection = %E::COLLECTION, "feed subscribed");
        FeedHandle { id, events }
    }

    pub fn unsubscribe(&self, id: FeedId) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!(feed_id = id, collection = %E::COLLECTION, "feed unsubscribed");
        }
    }

    /// Deliver `event` to every subscriber scoped to `owner_id`. Subscribers
    /// whose receiver is gone are dropped.
    pub fn publish(&self, owner_id: &str, event: &ChangeEvent<E>) {
        self.lock().retain(|_, sub| {
            if sub.owner_id != owner_id {
                return true;
            }
            sub.tx.send(event.clone()).is_ok()
        });
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<FeedId, Subscriber<E>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
