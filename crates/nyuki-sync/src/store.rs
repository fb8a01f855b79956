//! Local cache of one server-owned collection.
//!
//! The cache has two layers:
//!
//! - **confirmed**: the last authoritative record per id, plus tombstones
//!   carrying the version each delete was committed at;
//! - **pending**: optimistic updates/deletes per id in call order, plus
//!   placeholders for creates still in flight.
//!
//! What watchers see is always the confirmed layer with the pending layer
//! folded on top. Incoming records (pushed events, write responses, RPC
//! results) only ever touch the confirmed layer and pass the version rule:
//! older than the held version is stale, equal is a duplicate.
//!
//! Every write is a plain method that applies its optimistic change, spawns
//! the remote call, and returns a [`PendingWrite`]. Remote calls for one id
//! are serialized in call order by the [`OpQueue`].

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use nyuki_auth::SessionScoped;
use nyuki_config::SyncConfig;
use nyuki_core::errors::BackendError;
use nyuki_core::events::ChangeEvent;
use nyuki_core::ids::{PREFIX_CORRELATION, generate_id, is_correlation_id};
use nyuki_core::record::SyncRecord;
use tokio::sync::{oneshot, watch};

use crate::backend::{CollectionBackend, Revision};
use crate::error::{ConflictDiscard, FetchError, WriteError};
use crate::hooks::{Committed, WriteHook};
use crate::pending::PendingWrite;
use crate::queue::{OpQueue, Ticket};

/// Full view of a collection as published to watchers.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot<E> {
    /// User the store is scoped to; `None` while detached.
    pub owner_id: Option<String>,
    /// A fetch has completed since the store was attached.
    pub loaded: bool,
    /// Visible records, oldest first.
    pub records: Vec<E>,
    /// Ids whose derived fields may be out of date.
    pub stale: BTreeSet<String>,
}

impl<E> Default for CollectionSnapshot<E> {
    fn default() -> Self {
        Self {
            owner_id: None,
            loaded: false,
            records: Vec::new(),
            stale: BTreeSet::new(),
        }
    }
}

impl<E: SyncRecord> CollectionSnapshot<E> {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&E> {
        self.records.iter().find(|r| r.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.records.iter()
    }

    #[must_use]
    pub fn is_stale(&self, id: &str) -> bool {
        self.stale.contains(id)
    }
}

// ---------------------------------------------------------------------------
// Cache state
// ---------------------------------------------------------------------------

enum PendingOp<E: SyncRecord> {
    Update { seq: u64, patch: E::Patch },
    Delete { seq: u64 },
}

impl<E: SyncRecord> PendingOp<E> {
    const fn seq(&self) -> u64 {
        match self {
            Self::Update { seq, .. } | Self::Delete { seq } => *seq,
        }
    }
}

struct Placeholder<E> {
    client_ref: String,
    record: E,
    /// The authoritative record already arrived through another path.
    hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Remote,
    Response,
    Replay,
}

struct State<E: SyncRecord> {
    owner_id: Option<String>,
    epoch: u64,
    loaded: bool,
    confirmed: HashMap<String, E>,
    tombstones: HashMap<String, i64>,
    pending: HashMap<String, Vec<PendingOp<E>>>,
    placeholders: Vec<Placeholder<E>>,
    /// Changes applied while a fetch is in flight, replayed over its result.
    captures: HashMap<u64, Vec<ChangeEvent<E>>>,
    next_fetch: u64,
    next_op: u64,
    stale: BTreeSet<String>,
    discards: VecDeque<ConflictDiscard>,
    queue: OpQueue,
}

impl<E: SyncRecord> State<E> {
    fn new() -> Self {
        Self {
            owner_id: None,
            epoch: 0,
            loaded: false,
            confirmed: HashMap::new(),
            tombstones: HashMap::new(),
            pending: HashMap::new(),
            placeholders: Vec::new(),
            captures: HashMap::new(),
            next_fetch: 0,
            next_op: 0,
            stale: BTreeSet::new(),
            discards: VecDeque::new(),
            queue: OpQueue::default(),
        }
    }

    /// Drop everything and start a new epoch. In-flight completions from the
    /// old epoch are discarded when they arrive.
    fn reset(&mut self, owner_id: Option<String>) {
        self.epoch += 1;
        self.owner_id = owner_id;
        self.loaded = false;
        self.confirmed.clear();
        self.tombstones.clear();
        self.pending.clear();
        self.placeholders.clear();
        self.captures.clear();
        self.stale.clear();
        self.discards.clear();
        self.queue.clear();
    }

    fn held_version(&self, id: &str) -> Option<i64> {
        self.confirmed
            .get(id)
            .map(SyncRecord::version)
            .or_else(|| self.tombstones.get(id).copied())
    }

    fn apply(&mut self, event: ChangeEvent<E>, origin: Origin) -> Result<(), ConflictDiscard> {
        let id = event.id().to_string();
        let incoming = event.version();

        if let Some(record) = event.record()
            && let Some(owner_id) = &self.owner_id
            && record.owner_id() != owner_id
        {
            return Err(ConflictDiscard::ForeignOwner {
                id,
                owner_id: record.owner_id().to_string(),
            });
        }
        if let Some(current) = self.held_version(&id) {
            if incoming < current {
                return Err(ConflictDiscard::Stale {
                    id,
                    incoming,
                    current,
                });
            }
            if incoming == current {
                return Err(ConflictDiscard::Duplicate {
                    id,
                    version: incoming,
                });
            }
        }

        if origin != Origin::Replay {
            for capture in self.captures.values_mut() {
                capture.push(event.clone());
            }
        }

        match event {
            ChangeEvent::Insert { record } | ChangeEvent::Update { record } => {
                if let Some(client_ref) = record.client_ref() {
                    for placeholder in &mut self.placeholders {
                        if placeholder.client_ref == client_ref {
                            placeholder.hidden = true;
                        }
                    }
                }
                self.tombstones.remove(&id);
                self.confirmed.insert(id.clone(), record);
            }
            ChangeEvent::Delete { .. } => {
                self.confirmed.remove(&id);
                self.tombstones.insert(id.clone(), incoming);
                self.stale.remove(&id);
            }
        }
        Ok(())
    }

    /// The visible record for `id`: a live placeholder, or the confirmed
    /// record with its pending operations applied in call order.
    fn fold(&self, id: &str) -> Option<E> {
        if let Some(placeholder) = self
            .placeholders
            .iter()
            .find(|p| !p.hidden && p.client_ref == id)
        {
            return Some(placeholder.record.clone());
        }
        let mut record = self.confirmed.get(id)?.clone();
        for op in self.pending.get(id).into_iter().flatten() {
            match op {
                PendingOp::Update { patch, .. } => record.apply_patch(patch),
                PendingOp::Delete { .. } => return None,
            }
        }
        Some(record)
    }

    fn snapshot(&self) -> CollectionSnapshot<E> {
        let mut records: Vec<E> = self
            .confirmed
            .keys()
            .filter_map(|id| self.fold(id))
            .chain(
                self.placeholders
                    .iter()
                    .filter(|p| !p.hidden)
                    .map(|p| p.record.clone()),
            )
            .collect();
        records.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        CollectionSnapshot {
            owner_id: self.owner_id.clone(),
            loaded: self.loaded,
            records,
            stale: self.stale.clone(),
        }
    }

    fn push_op(&mut self, id: &str, op: impl FnOnce(u64) -> PendingOp<E>) -> u64 {
        self.next_op += 1;
        let seq = self.next_op;
        self.pending.entry(id.to_string()).or_default().push(op(seq));
        seq
    }

    fn drop_op(&mut self, id: &str, seq: u64) {
        let emptied = self.pending.get_mut(id).is_some_and(|ops| {
            ops.retain(|op| op.seq() != seq);
            ops.is_empty()
        });
        if emptied {
            self.pending.remove(id);
        }
    }

    fn record_discard(&mut self, discard: ConflictDiscard, capacity: usize) {
        tracing::debug!(collection = %E::COLLECTION, %discard, "discarded incoming change");
        if capacity == 0 {
            return;
        }
        while self.discards.len() >= capacity {
            self.discards.pop_front();
        }
        self.discards.push_back(discard);
    }
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

struct Inner<E: SyncRecord> {
    backend: Arc<dyn CollectionBackend<E>>,
    hook: Option<Arc<dyn WriteHook<E>>>,
    config: SyncConfig,
    state: Mutex<State<E>>,
    tx: watch::Sender<CollectionSnapshot<E>>,
}

/// Cheap to clone; clones share one cache.
pub struct EntityStore<E: SyncRecord> {
    inner: Arc<Inner<E>>,
}

impl<E: SyncRecord> Clone for EntityStore<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: SyncRecord> EntityStore<E> {
    #[must_use]
    pub fn new(backend: Arc<dyn CollectionBackend<E>>, config: SyncConfig) -> Self {
        Self::build(backend, None, config)
    }

    #[must_use]
    pub fn with_hook(
        backend: Arc<dyn CollectionBackend<E>>,
        hook: Arc<dyn WriteHook<E>>,
        config: SyncConfig,
    ) -> Self {
        Self::build(backend, Some(hook), config)
    }

    fn build(
        backend: Arc<dyn CollectionBackend<E>>,
        hook: Option<Arc<dyn WriteHook<E>>>,
        config: SyncConfig,
    ) -> Self {
        let (tx, _) = watch::channel(CollectionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                hook,
                config,
                state: Mutex::new(State::new()),
                tx,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Subscribe to collection changes (`onCollectionChange`).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CollectionSnapshot<E>> {
        self.inner.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> CollectionSnapshot<E> {
        self.lock().snapshot()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<E> {
        self.lock().fold(id)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    #[must_use]
    pub fn owner_id(&self) -> Option<String> {
        self.lock().owner_id.clone()
    }

    /// Whether `id` has optimistic changes that are not yet confirmed.
    #[must_use]
    pub fn has_pending(&self, id: &str) -> bool {
        let state = self.lock();
        state.pending.contains_key(id)
            || state
                .placeholders
                .iter()
                .any(|p| !p.hidden && p.client_ref == id)
    }

    /// Recently discarded changes, oldest first.
    #[must_use]
    pub fn discards(&self) -> Vec<ConflictDiscard> {
        self.lock().discards.iter().cloned().collect()
    }

    #[must_use]
    pub fn is_stale(&self, id: &str) -> bool {
        self.lock().stale.contains(id)
    }

    /// Flag `id` as possibly out of date. The flag survives fetches and
    /// pushes; it goes away with [`clear_stale`](Self::clear_stale), a
    /// deletion of `id`, or a teardown.
    pub fn mark_stale(&self, id: &str) {
        let mut state = self.lock();
        if state.confirmed.contains_key(id) && state.stale.insert(id.to_string()) {
            self.publish(&state);
        }
    }

    pub fn clear_stale(&self, id: &str) {
        let mut state = self.lock();
        if state.stale.remove(id) {
            self.publish(&state);
        }
    }

    /// The current epoch, if the store is attached to `owner_id`.
    pub(crate) fn epoch_for(&self, owner_id: &str) -> Option<u64> {
        let state = self.lock();
        (state.owner_id.as_deref() == Some(owner_id)).then_some(state.epoch)
    }

    // -----------------------------------------------------------------------
    // Scope
    // -----------------------------------------------------------------------

    /// Scope the store to `owner_id`. Switching owners drops the cache.
    /// Returns the current epoch.
    pub fn attach(&self, owner_id: &str) -> u64 {
        let mut state = self.lock();
        if state.owner_id.as_deref() != Some(owner_id) {
            state.reset(Some(owner_id.to_string()));
            tracing::debug!(collection = %E::COLLECTION, owner_id, epoch = state.epoch, "store attached");
            self.publish(&state);
        }
        state.epoch
    }

    /// Drop the cache and detach from the session. Responses to requests made
    /// before this call are discarded when they arrive.
    pub fn teardown(&self) {
        let mut state = self.lock();
        if state.owner_id.is_none() {
            return;
        }
        state.reset(None);
        tracing::debug!(collection = %E::COLLECTION, epoch = state.epoch, "store torn down");
        self.publish(&state);
    }

    // -----------------------------------------------------------------------
    // Fetch
    // -----------------------------------------------------------------------

    /// Replace the cache with every record `owner_id` owns.
    ///
    /// The store must already be attached to `owner_id`. Changes applied
    /// while the request is in flight are replayed over the result. On
    /// failure the previous cache is kept.
    ///
    /// # Errors
    ///
    /// `FetchError::Transport`/`Timeout` from the backend, or `TornDown` if the
    /// store is not attached to `owner_id` or was detached before the
    /// response arrived.
    pub async fn fetch_all(&self, owner_id: &str) -> Result<usize, FetchError> {
        let (epoch, fetch) = {
            let mut state = self.lock();
            if state.owner_id.as_deref() != Some(owner_id) {
                return Err(FetchError::TornDown);
            }
            state.next_fetch += 1;
            let fetch = state.next_fetch;
            state.captures.insert(fetch, Vec::new());
            (state.epoch, fetch)
        };

        let result =
            tokio::time::timeout(self.inner.config.request_timeout(), self.inner.backend.list(owner_id))
                .await;

        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!(collection = %E::COLLECTION, "fetch response arrived after teardown; dropped");
            return Err(FetchError::TornDown);
        }
        let captured = state.captures.remove(&fetch).unwrap_or_default();
        let records = match result {
            Ok(Ok(records)) => records,
            Ok(Err(error)) => {
                tracing::warn!(collection = %E::COLLECTION, %error, "fetch failed; keeping previous cache");
                return Err(error.into());
            }
            Err(_) => {
                tracing::warn!(collection = %E::COLLECTION, "fetch timed out; keeping previous cache");
                return Err(FetchError::Timeout);
            }
        };

        let state = &mut *state;
        state.confirmed = records
            .into_iter()
            .filter(|r| r.owner_id() == owner_id)
            .map(|r| (r.id().to_string(), r))
            .collect();
        state.tombstones.clear();
        let confirmed = &state.confirmed;
        state.stale.retain(|id| confirmed.contains_key(id));
        let fetched_refs: BTreeSet<&str> = state
            .confirmed
            .values()
            .filter_map(SyncRecord::client_ref)
            .collect();
        for placeholder in &mut state.placeholders {
            if fetched_refs.contains(placeholder.client_ref.as_str()) {
                placeholder.hidden = true;
            }
        }
        for event in captured {
            let _ = state.apply(event, Origin::Replay);
        }
        state.loaded = true;
        let count = state.confirmed.len();
        tracing::debug!(collection = %E::COLLECTION, owner_id, count, "fetched collection");
        self.publish(state);
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a placeholder now and create the record remotely.
    ///
    /// The placeholder's id is the correlation id exposed by
    /// [`PendingWrite::client_ref`]. On success it is replaced by the
    /// authoritative record; on failure it is removed.
    pub fn create(&self, draft: E::Draft) -> PendingWrite<E> {
        if let Err(error) = E::validate_draft(&draft) {
            return PendingWrite::failed(WriteError::Invalid(error.to_string()));
        }
        if let Some(hook) = &self.inner.hook
            && let Err(error) = hook.check_create(&draft)
        {
            return PendingWrite::failed(error);
        }

        let client_ref = generate_id(PREFIX_CORRELATION);
        let (owner_id, epoch) = {
            let mut state = self.lock();
            let Some(owner_id) = state.owner_id.clone() else {
                return PendingWrite::failed(WriteError::TornDown);
            };
            let record = E::placeholder(&owner_id, &client_ref, &draft, Utc::now());
            state.placeholders.push(Placeholder {
                client_ref: client_ref.clone(),
                record,
                hidden: false,
            });
            self.publish(&state);
            (owner_id, state.epoch)
        };

        let (tx, rx) = oneshot::channel();
        let store = self.clone();
        let task_ref = client_ref.clone();
        tokio::spawn(async move {
            let result = store.run_create(&owner_id, epoch, &draft, &task_ref).await;
            let _ = tx.send(result);
        });
        PendingWrite::waiting(rx).with_client_ref(client_ref)
    }

    async fn run_create(
        &self,
        owner_id: &str,
        epoch: u64,
        draft: &E::Draft,
        client_ref: &str,
    ) -> Result<E, WriteError> {
        let result = self
            .remote(self.inner.backend.create(owner_id, draft, client_ref))
            .await;

        let attached = {
            let mut state = self.lock();
            let attached = state.epoch == epoch;
            if attached {
                state.placeholders.retain(|p| p.client_ref != client_ref);
                if let Ok(record) = &result {
                    Self::commit(
                        &mut state,
                        ChangeEvent::Insert {
                            record: record.clone(),
                        },
                    );
                }
                self.publish(&state);
            }
            attached
        };

        let record = result.inspect_err(|error| {
            tracing::info!(collection = %E::COLLECTION, client_ref, %error, "create failed; placeholder removed");
        })?;
        self.run_hook(Committed::Created(record.clone())).await;
        if attached {
            Ok(record)
        } else {
            Err(WriteError::TornDown)
        }
    }

    /// Apply `patch` now and update the record remotely. Reverted on failure.
    pub fn update(&self, id: &str, patch: E::Patch) -> PendingWrite<E> {
        let (owner_id, epoch, seq, ticket) = {
            let mut state = self.lock();
            let current = match Self::writable(&state, id) {
                Ok(current) => current,
                Err(error) => return PendingWrite::failed(error),
            };
            if let Some(hook) = &self.inner.hook
                && let Err(error) = hook.check_update(&current, &patch)
            {
                return PendingWrite::failed(error);
            }
            let seq = state.push_op(id, |seq| PendingOp::Update {
                seq,
                patch: patch.clone(),
            });
            let ticket = state.queue.enqueue(id);
            self.publish(&state);
            (current.owner_id().to_string(), state.epoch, seq, ticket)
        };

        let (tx, rx) = oneshot::channel();
        let store = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let mut ticket = ticket;
            ticket.ready().await;
            let result = store
                .run_update(&owner_id, epoch, &id, seq, &patch, &ticket)
                .await;
            let _ = tx.send(result);
            ticket.finish();
        });
        PendingWrite::waiting(rx)
    }

    async fn run_update(
        &self,
        owner_id: &str,
        epoch: u64,
        id: &str,
        seq: u64,
        patch: &E::Patch,
        ticket: &Ticket,
    ) -> Result<E, WriteError> {
        if self.lock().epoch != epoch {
            return Err(WriteError::TornDown);
        }

        let result = self
            .remote(self.inner.backend.update(owner_id, id, patch))
            .await;
        let outcome = result.as_ref().ok().map(|revision| ChangeEvent::Update {
            record: revision.after.clone(),
        });
        let attached = self.settle(epoch, id, seq, ticket, outcome);

        let Revision { before, after } = result.inspect_err(|error| {
            tracing::info!(collection = %E::COLLECTION, id, %error, "update failed; reverted");
        })?;
        self.run_hook(Committed::Updated {
            before,
            after: after.clone(),
        })
        .await;
        if attached {
            Ok(after)
        } else {
            Err(WriteError::TornDown)
        }
    }

    /// Hide the record now and delete it remotely. Re-shown on failure.
    pub fn delete(&self, id: &str) -> PendingWrite<()> {
        let (owner_id, epoch, seq, ticket) = {
            let mut state = self.lock();
            let current = match Self::writable(&state, id) {
                Ok(current) => current,
                Err(error) => return PendingWrite::failed(error),
            };
            let seq = state.push_op(id, |seq| PendingOp::Delete { seq });
            let ticket = state.queue.enqueue(id);
            self.publish(&state);
            (current.owner_id().to_string(), state.epoch, seq, ticket)
        };

        let (tx, rx) = oneshot::channel();
        let store = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let mut ticket = ticket;
            ticket.ready().await;
            let result = store.run_delete(&owner_id, epoch, &id, seq, &ticket).await;
            let _ = tx.send(result);
            ticket.finish();
        });
        PendingWrite::waiting(rx)
    }

    async fn run_delete(
        &self,
        owner_id: &str,
        epoch: u64,
        id: &str,
        seq: u64,
        ticket: &Ticket,
    ) -> Result<(), WriteError> {
        if self.lock().epoch != epoch {
            return Err(WriteError::TornDown);
        }

        let result = self.remote(self.inner.backend.delete(owner_id, id)).await;
        let outcome = result.as_ref().ok().map(|removal| ChangeEvent::Delete {
            id: id.to_string(),
            version: removal.version,
        });
        let attached = self.settle(epoch, id, seq, ticket, outcome);

        let removal = result.inspect_err(|error| {
            tracing::info!(collection = %E::COLLECTION, id, %error, "delete failed; restored");
        })?;
        self.run_hook(Committed::Deleted(removal.record)).await;
        if attached {
            Ok(())
        } else {
            Err(WriteError::TornDown)
        }
    }

    /// The visible record `id`, if it can be written to right now.
    fn writable(state: &State<E>, id: &str) -> Result<E, WriteError> {
        if state.owner_id.is_none() {
            return Err(WriteError::TornDown);
        }
        if is_correlation_id(id) {
            return Err(WriteError::Invalid(format!("{id} is still being created")));
        }
        state.fold(id).ok_or_else(|| WriteError::NotFound {
            collection: E::COLLECTION,
            id: id.to_string(),
        })
    }

    /// Retire a pending op and fold in its authoritative outcome. Returns
    /// whether the store was still in the op's epoch.
    fn settle(
        &self,
        epoch: u64,
        id: &str,
        seq: u64,
        ticket: &Ticket,
        outcome: Option<ChangeEvent<E>>,
    ) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            return false;
        }
        state.drop_op(id, seq);
        state.queue.release(ticket);
        if let Some(event) = outcome {
            Self::commit(&mut state, event);
        }
        self.publish(&state);
        true
    }

    fn commit(state: &mut State<E>, event: ChangeEvent<E>) {
        if let Err(discard) = state.apply(event, Origin::Response) {
            tracing::debug!(collection = %E::COLLECTION, %discard, "write response superseded by a newer change");
        }
    }

    async fn run_hook(&self, committed: Committed<E>) {
        if let Some(hook) = &self.inner.hook {
            hook.after_commit(&committed).await;
        }
    }

    async fn remote<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, WriteError> {
        match tokio::time::timeout(self.inner.config.request_timeout(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(WriteError::from_backend(E::COLLECTION, error)),
            Err(_) => Err(WriteError::Timeout),
        }
    }

    // -----------------------------------------------------------------------
    // Incoming changes
    // -----------------------------------------------------------------------

    /// Merge a pushed change. Only the subscription bridge and tests call this.
    ///
    /// # Errors
    ///
    /// Returns the [`ConflictDiscard`] explaining why the change was ignored.
    pub fn apply_remote_event(&self, event: ChangeEvent<E>) -> Result<(), ConflictDiscard> {
        self.deliver(None, event)
    }

    /// Merge an authoritative record obtained outside this store (the result
    /// of a counter RPC).
    ///
    /// # Errors
    ///
    /// Returns the [`ConflictDiscard`] explaining why the record was ignored.
    pub fn apply_authoritative(&self, record: E) -> Result<(), ConflictDiscard> {
        self.deliver(None, ChangeEvent::Update { record })
    }

    /// Merge a change produced for `epoch`; with `None` the current epoch is assumed.
    pub(crate) fn deliver(
        &self,
        epoch: Option<u64>,
        event: ChangeEvent<E>,
    ) -> Result<(), ConflictDiscard> {
        let mut state = self.lock();
        if state.owner_id.is_none() || epoch.is_some_and(|e| e != state.epoch) {
            return Err(ConflictDiscard::Detached {
                id: event.id().to_string(),
            });
        }
        match state.apply(event, Origin::Remote) {
            Ok(()) => {
                self.publish(&state);
                Ok(())
            }
            Err(discard) => {
                state.record_discard(discard.clone(), self.inner.config.discard_log_capacity);
                Err(discard)
            }
        }
    }

    fn publish(&self, state: &State<E>) {
        self.inner.tx.send_replace(state.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, State<E>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: SyncRecord> SessionScoped for EntityStore<E> {
    fn teardown(&self) {
        Self::teardown(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use nyuki_core::entities::{Apiary, NewApiary};
    use nyuki_core::updates::apiary::ApiaryPatchBuilder;
    use pretty_assertions::assert_eq;

    const OWNER: &str = "usr-00000001";

    fn apiary(id: &str, version: i64) -> Apiary {
        let mut apiary = Apiary::placeholder(
            OWNER,
            "tmp-00000000",
            &NewApiary {
                name: "Home".into(),
                location: "Arusha".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        apiary.id = id.into();
        apiary.client_ref = None;
        apiary.version = version;
        apiary
    }

    fn attached_state() -> State<Apiary> {
        let mut state = State::new();
        state.reset(Some(OWNER.into()));
        state
    }

    #[test]
    fn version_rule_discards_stale_and_duplicate() {
        let mut state = attached_state();
        state
            .apply(ChangeEvent::Insert { record: apiary("apy-1", 3) }, Origin::Remote)
            .unwrap();

        let stale = state
            .apply(ChangeEvent::Update { record: apiary("apy-1", 2) }, Origin::Remote)
            .unwrap_err();
        assert_eq!(
            stale,
            ConflictDiscard::Stale {
                id: "apy-1".into(),
                incoming: 2,
                current: 3
            }
        );
        let dup = state
            .apply(ChangeEvent::Update { record: apiary("apy-1", 3) }, Origin::Remote)
            .unwrap_err();
        assert!(matches!(dup, ConflictDiscard::Duplicate { version: 3, .. }));
    }

    #[test]
    fn tombstone_blocks_older_insert() {
        let mut state = attached_state();
        state
            .apply(
                ChangeEvent::Delete {
                    id: "apy-1".into(),
                    version: 5,
                },
                Origin::Remote,
            )
            .unwrap();
        assert!(
            state
                .apply(ChangeEvent::Insert { record: apiary("apy-1", 4) }, Origin::Remote)
                .is_err()
        );
        assert!(state.fold("apy-1").is_none());
    }

    #[test]
    fn foreign_owner_is_discarded() {
        let mut state = attached_state();
        let mut record = apiary("apy-1", 1);
        record.user_id = "usr-99999999".into();
        assert!(matches!(
            state.apply(ChangeEvent::Insert { record }, Origin::Remote),
            Err(ConflictDiscard::ForeignOwner { .. })
        ));
    }

    #[test]
    fn pending_ops_fold_over_confirmed_in_call_order() {
        let mut state = attached_state();
        state
            .apply(ChangeEvent::Insert { record: apiary("apy-1", 1) }, Origin::Remote)
            .unwrap();
        let first = state.push_op("apy-1", |seq| PendingOp::Update {
            seq,
            patch: ApiaryPatchBuilder::new().name("Hill").build(),
        });
        state.push_op("apy-1", |seq| PendingOp::Update {
            seq,
            patch: ApiaryPatchBuilder::new().name("Valley").build(),
        });
        assert_eq!(state.fold("apy-1").unwrap().name, "Valley");

        // A pushed event lands under the pending layer.
        let mut pushed = apiary("apy-1", 2);
        pushed.location = "Moshi".into();
        state
            .apply(ChangeEvent::Update { record: pushed }, Origin::Remote)
            .unwrap();
        let folded = state.fold("apy-1").unwrap();
        assert_eq!(folded.name, "Valley");
        assert_eq!(folded.location, "Moshi");

        state.drop_op("apy-1", first);
        assert_eq!(state.pending["apy-1"].len(), 1);
    }

    #[test]
    fn pending_delete_hides_record() {
        let mut state = attached_state();
        state
            .apply(ChangeEvent::Insert { record: apiary("apy-1", 1) }, Origin::Remote)
            .unwrap();
        let seq = state.push_op("apy-1", |seq| PendingOp::Delete { seq });
        assert!(state.snapshot().is_empty());
        state.drop_op("apy-1", seq);
        assert_eq!(state.snapshot().len(), 1);
        assert!(state.pending.is_empty());
    }

    #[test]
    fn insert_with_client_ref_hides_placeholder() {
        let mut state = attached_state();
        let draft = NewApiary {
            name: "Home".into(),
            location: "Arusha".into(),
            ..Default::default()
        };
        state.placeholders.push(Placeholder {
            client_ref: "tmp-0000abcd".into(),
            record: Apiary::placeholder(OWNER, "tmp-0000abcd", &draft, Utc::now()),
            hidden: false,
        });
        let mut confirmed = apiary("apy-1", 1);
        confirmed.client_ref = Some("tmp-0000abcd".into());
        state
            .apply(ChangeEvent::Insert { record: confirmed }, Origin::Remote)
            .unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.records[0].id, "apy-1");
    }

    #[test]
    fn snapshot_orders_by_creation() {
        let mut state = attached_state();
        let mut older = apiary("apy-b", 1);
        older.created_at = Utc::now() - TimeDelta::hours(1);
        state
            .apply(ChangeEvent::Insert { record: apiary("apy-a", 1) }, Origin::Remote)
            .unwrap();
        state
            .apply(ChangeEvent::Insert { record: older }, Origin::Remote)
            .unwrap();
        let ids: Vec<_> = state.snapshot().records.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["apy-b", "apy-a"]);
    }

    #[test]
    fn discard_log_is_bounded() {
        let mut state = attached_state();
        for version in 0..5 {
            state.record_discard(
                ConflictDiscard::Duplicate {
                    id: "apy-1".into(),
                    version,
                },
                3,
            );
        }
        assert_eq!(state.discards.len(), 3);
        assert!(matches!(
            state.discards.front(),
            Some(ConflictDiscard::Duplicate { version: 2, .. })
        ));
    }

    #[test]
    fn captures_record_live_changes_but_not_replays() {
        let mut state = attached_state();
        state.captures.insert(1, Vec::new());
        state
            .apply(ChangeEvent::Insert { record: apiary("apy-1", 1) }, Origin::Remote)
            .unwrap();
        state
            .apply(ChangeEvent::Update { record: apiary("apy-1", 2) }, Origin::Replay)
            .unwrap();
        assert_eq!(state.captures[&1].len(), 1);
    }

    #[test]
    fn stale_flag_outlives_updates_but_not_deletion() {
        let mut state = attached_state();
        state
            .apply(ChangeEvent::Insert { record: apiary("apy-1", 1) }, Origin::Remote)
            .unwrap();
        state.stale.insert("apy-1".into());

        state
            .apply(ChangeEvent::Update { record: apiary("apy-1", 2) }, Origin::Remote)
            .unwrap();
        assert!(state.snapshot().is_stale("apy-1"));

        state
            .apply(
                ChangeEvent::Delete {
                    id: "apy-1".into(),
                    version: 3,
                },
                Origin::Remote,
            )
            .unwrap();
        assert!(!state.snapshot().is_stale("apy-1"));
    }
}
