//! A scriptable in-memory backend.
//!
//! [`MemoryBackend`] implements every backend trait over plain maps and
//! publishes committed changes through [`FeedRegistry`]s, like the embedded
//! database does. Each call can be scripted per [`Op`]: held until released,
//! delayed, or failed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use nyuki_auth::{AuthBackend, SignUpAccount, TokenClaims};
use nyuki_core::entities::{Apiary, Hive, NewApiary, NewHive, Profile, Session};
use nyuki_core::enums::Collection;
use nyuki_core::errors::BackendError;
use nyuki_core::events::ChangeEvent;
use nyuki_core::ids::{PREFIX_APIARY, PREFIX_HIVE, PREFIX_USER, generate_id, random_hex};
use nyuki_core::record::SyncRecord;
use nyuki_core::updates::apiary::ApiaryPatch;
use nyuki_core::updates::hive::HivePatch;
use nyuki_core::updates::profile::ProfilePatch;
use tokio::sync::oneshot;

use crate::backend::{
    ChangeFeed, CollectionBackend, CounterBackend, FeedHandle, FeedId, Removal, Revision,
};
use crate::feed::FeedRegistry;

/// A scriptable backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SignUp,
    SignIn,
    SignOut,
    Restore,
    FetchProfile,
    CreateProfile,
    UpdateProfile,
    List(Collection),
    Create(Collection),
    Update(Collection),
    Delete(Collection),
    Subscribe(Collection),
    IncrementHiveCount,
    DecrementHiveCount,
    RecountHives,
}

/// Releases a call held by [`MemoryBackend::hold_next`]. Dropping it releases
/// the call too.
#[derive(Debug)]
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

#[derive(Default)]
struct Script {
    calls: usize,
    holds: VecDeque<oneshot::Receiver<()>>,
    delays: VecDeque<Duration>,
    failures: VecDeque<BackendError>,
}

struct Account {
    user_id: String,
    password: String,
    verified: bool,
}

#[derive(Default)]
struct Data {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, Session>,
    profiles: HashMap<String, Profile>,
    apiaries: HashMap<String, Apiary>,
    hives: HashMap<String, Hive>,
}

pub struct MemoryBackend {
    data: Mutex<Data>,
    scripts: Mutex<HashMap<Op, Script>>,
    apiary_feed: FeedRegistry<Apiary>,
    hive_feed: FeedRegistry<Hive>,
    muted: Mutex<HashSet<Collection>>,
    session_ttl: TimeDelta,
    require_email_verification: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Data::default()),
            scripts: Mutex::new(HashMap::new()),
            apiary_feed: FeedRegistry::new(),
            hive_feed: FeedRegistry::new(),
            muted: Mutex::new(HashSet::new()),
            session_ttl: TimeDelta::hours(1),
            require_email_verification: false,
        }
    }

    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: TimeDelta) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// New accounts get no session until [`Self::confirm_email`] is called.
    #[must_use]
    pub const fn with_email_verification(mut self) -> Self {
        self.require_email_verification = true;
        self
    }

    // -----------------------------------------------------------------------
    // Scripting
    // -----------------------------------------------------------------------

    /// The next `op` call waits until the returned gate is released.
    pub fn hold_next(&self, op: Op) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.script(op, |s| s.holds.push_back(rx));
        Gate(tx)
    }

    pub fn delay_next(&self, op: Op, delay: Duration) {
        self.script(op, |s| s.delays.push_back(delay));
    }

    /// The next `op` call fails with `error` without touching any data.
    pub fn fail_next(&self, op: Op, error: BackendError) {
        self.script(op, |s| s.failures.push_back(error));
    }

    /// How many times `op` has been called.
    #[must_use]
    pub fn calls(&self, op: Op) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&op)
            .map_or(0, |s| s.calls)
    }

    /// Push an arbitrary apiary event to `owner_id`'s subscribers.
    pub fn emit_apiary(&self, owner_id: &str, event: ChangeEvent<Apiary>) {
        self.apiary_feed.publish(owner_id, &event);
    }

    /// Push an arbitrary hive event to `owner_id`'s subscribers.
    pub fn emit_hive(&self, owner_id: &str, event: ChangeEvent<Hive>) {
        self.hive_feed.publish(owner_id, &event);
    }

    /// Stop publishing committed `collection` writes until
    /// [`Self::unmute_feed`]. Subscriptions stay open.
    pub fn mute_feed(&self, collection: Collection) {
        self.muted_feeds().insert(collection);
    }

    pub fn unmute_feed(&self, collection: Collection) {
        self.muted_feeds().remove(&collection);
    }

    #[must_use]
    pub fn feed_subscribers(&self, collection: Collection) -> usize {
        match collection {
            Collection::Apiaries => self.apiary_feed.subscriber_count(),
            Collection::Hives => self.hive_feed.subscriber_count(),
        }
    }

    // -----------------------------------------------------------------------
    // Server-side inspection
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn apiary(&self, id: &str) -> Option<Apiary> {
        self.lock().apiaries.get(id).cloned()
    }

    #[must_use]
    pub fn hive(&self, id: &str) -> Option<Hive> {
        self.lock().hives.get(id).cloned()
    }

    /// Number of hives whose `apiary_id` is `apiary_id`, counted directly.
    #[must_use]
    pub fn hives_in(&self, apiary_id: &str) -> usize {
        self.lock()
            .hives
            .values()
            .filter(|h| h.apiary_id == apiary_id)
            .count()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Mark the account for `email` as verified.
    ///
    /// # Errors
    ///
    /// `BackendError::NotFound` if no account uses `email`.
    pub fn confirm_email(&self, email: &str) -> Result<(), BackendError> {
        let mut data = self.lock();
        let account = data.accounts.get_mut(email).ok_or_else(|| BackendError::NotFound {
            collection: "users".into(),
            id: email.to_string(),
        })?;
        account.verified = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn script<R>(&self, op: Op, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        f(scripts.entry(op).or_default())
    }

    /// Count the call and play its script.
    async fn enter(&self, op: Op) -> Result<(), BackendError> {
        let (hold, delay, failure) = self.script(op, |script| {
            script.calls += 1;
            (
                script.holds.pop_front(),
                script.delays.pop_front(),
                script.failures.pop_front(),
            )
        });
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        failure.map_or(Ok(()), Err)
    }

    fn issue_session(&self, data: &mut Data, user_id: &str, email: &str) -> Session {
        let expires_at = Utc::now() + self.session_ttl;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: expires_at.timestamp(),
        };
        let token = format!("mem.{}.{}", claims.encode_payload(), random_hex(8));
        let session = Session {
            token: token.clone(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            expires_at,
        };
        data.sessions.insert(token, session.clone());
        session
    }

    fn lock(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn muted_feeds(&self) -> MutexGuard<'_, HashSet<Collection>> {
        self.muted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_apiary(&self, owner_id: &str, event: &ChangeEvent<Apiary>) {
        if !self.muted_feeds().contains(&Collection::Apiaries) {
            self.apiary_feed.publish(owner_id, event);
        }
    }

    fn publish_hive(&self, owner_id: &str, event: &ChangeEvent<Hive>) {
        if !self.muted_feeds().contains(&Collection::Hives) {
            self.hive_feed.publish(owner_id, event);
        }
    }
}

fn not_found(collection: Collection, id: &str) -> BackendError {
    BackendError::NotFound {
        collection: collection.as_str().to_string(),
        id: id.to_string(),
    }
}

fn owned_apiary<'a>(
    data: &'a mut Data,
    owner_id: &str,
    id: &str,
) -> Result<&'a mut Apiary, BackendError> {
    data.apiaries
        .get_mut(id)
        .filter(|a| a.user_id == owner_id)
        .ok_or_else(|| not_found(Collection::Apiaries, id))
}

fn require_parent(data: &Data, owner_id: &str, apiary_id: &str) -> Result<(), BackendError> {
    if data
        .apiaries
        .get(apiary_id)
        .is_some_and(|a| a.user_id == owner_id)
    {
        Ok(())
    } else {
        Err(BackendError::Rejected(format!(
            "foreign key violation: apiary {apiary_id} does not exist"
        )))
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpAccount, BackendError> {
        self.enter(Op::SignUp).await?;
        let mut data = self.lock();
        if data.accounts.contains_key(email) {
            return Err(BackendError::AccountExists(email.to_string()));
        }
        let user_id = generate_id(PREFIX_USER);
        data.accounts.insert(
            email.to_string(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
                verified: !self.require_email_verification,
            },
        );
        let session = (!self.require_email_verification)
            .then(|| self.issue_session(&mut data, &user_id, email));
        Ok(SignUpAccount {
            user_id,
            email: email.to_string(),
            session,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.enter(Op::SignIn).await?;
        let mut data = self.lock();
        let (user_id, verified) = match data.accounts.get(email) {
            Some(account) if account.password == password => {
                (account.user_id.clone(), account.verified)
            }
            _ => return Err(BackendError::InvalidCredentials),
        };
        if !verified {
            return Err(BackendError::EmailUnverified(email.to_string()));
        }
        Ok(self.issue_session(&mut data, &user_id, email))
    }

    async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        self.enter(Op::SignOut).await?;
        self.lock().sessions.remove(token);
        Ok(())
    }

    async fn restore_session(&self, token: &str) -> Result<Option<Session>, BackendError> {
        self.enter(Op::Restore).await?;
        Ok(self
            .lock()
            .sessions
            .get(token)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        self.enter(Op::FetchProfile).await?;
        Ok(self.lock().profiles.get(user_id).cloned())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, BackendError> {
        self.enter(Op::CreateProfile).await?;
        let mut data = self.lock();
        if data.profiles.contains_key(&profile.user_id) {
            return Err(BackendError::Rejected(format!(
                "profile for {} already exists",
                profile.user_id
            )));
        }
        data.profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, BackendError> {
        self.enter(Op::UpdateProfile).await?;
        let mut data = self.lock();
        let profile = data.profiles.get_mut(user_id).ok_or_else(|| BackendError::NotFound {
            collection: "profiles".into(),
            id: user_id.to_string(),
        })?;
        profile.apply_patch(patch);
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[async_trait]
impl CollectionBackend<Apiary> for MemoryBackend {
    async fn list(&self, owner_id: &str) -> Result<Vec<Apiary>, BackendError> {
        self.enter(Op::List(Collection::Apiaries)).await?;
        Ok(self
            .lock()
            .apiaries
            .values()
            .filter(|a| a.user_id == owner_id)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        owner_id: &str,
        draft: &NewApiary,
        client_ref: &str,
    ) -> Result<Apiary, BackendError> {
        self.enter(Op::Create(Collection::Apiaries)).await?;
        let mut apiary = Apiary::placeholder(owner_id, client_ref, draft, Utc::now());
        apiary.id = generate_id(PREFIX_APIARY);
        apiary.version = 1;

        let mut data = self.lock();
        data.apiaries.insert(apiary.id.clone(), apiary.clone());
        self.publish_apiary(
            owner_id,
            &ChangeEvent::Insert {
                record: apiary.clone(),
            },
        );
        Ok(apiary)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: &ApiaryPatch,
    ) -> Result<Revision<Apiary>, BackendError> {
        self.enter(Op::Update(Collection::Apiaries)).await?;
        let mut data = self.lock();
        let apiary = owned_apiary(&mut data, owner_id, id)?;
        let before = apiary.clone();
        apiary.apply_patch(patch);
        apiary.version += 1;
        apiary.updated_at = Utc::now();
        let after = apiary.clone();
        self.publish_apiary(
            owner_id,
            &ChangeEvent::Update {
                record: after.clone(),
            },
        );
        Ok(Revision { before, after })
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<Removal<Apiary>, BackendError> {
        self.enter(Op::Delete(Collection::Apiaries)).await?;
        let mut data = self.lock();
        owned_apiary(&mut data, owner_id, id)?;
        if data.hives.values().any(|h| h.apiary_id == id) {
            return Err(BackendError::Rejected(format!(
                "foreign key violation: apiary {id} still has hives"
            )));
        }
        let record = data
            .apiaries
            .remove(id)
            .ok_or_else(|| not_found(Collection::Apiaries, id))?;
        let version = record.version + 1;
        self.publish_apiary(
            owner_id,
            &ChangeEvent::Delete {
                id: id.to_string(),
                version,
            },
        );
        Ok(Removal { record, version })
    }
}

#[async_trait]
impl CollectionBackend<Hive> for MemoryBackend {
    async fn list(&self, owner_id: &str) -> Result<Vec<Hive>, BackendError> {
        self.enter(Op::List(Collection::Hives)).await?;
        Ok(self
            .lock()
            .hives
            .values()
            .filter(|h| h.user_id == owner_id)
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        owner_id: &str,
        draft: &NewHive,
        client_ref: &str,
    ) -> Result<Hive, BackendError> {
        self.enter(Op::Create(Collection::Hives)).await?;
        let mut data = self.lock();
        require_parent(&data, owner_id, &draft.apiary_id)?;
        let mut hive = Hive::placeholder(owner_id, client_ref, draft, Utc::now());
        hive.id = generate_id(PREFIX_HIVE);
        hive.version = 1;
        data.hives.insert(hive.id.clone(), hive.clone());
        self.publish_hive(
            owner_id,
            &ChangeEvent::Insert {
                record: hive.clone(),
            },
        );
        Ok(hive)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: &HivePatch,
    ) -> Result<Revision<Hive>, BackendError> {
        self.enter(Op::Update(Collection::Hives)).await?;
        let mut data = self.lock();
        if let Some(apiary_id) = &patch.apiary_id {
            require_parent(&data, owner_id, apiary_id)?;
        }
        let hive = data
            .hives
            .get_mut(id)
            .filter(|h| h.user_id == owner_id)
            .ok_or_else(|| not_found(Collection::Hives, id))?;
        let before = hive.clone();
        hive.apply_patch(patch);
        hive.version += 1;
        hive.updated_at = Utc::now();
        let after = hive.clone();
        self.publish_hive(
            owner_id,
            &ChangeEvent::Update {
                record: after.clone(),
            },
        );
        Ok(Revision { before, after })
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<Removal<Hive>, BackendError> {
        self.enter(Op::Delete(Collection::Hives)).await?;
        let mut data = self.lock();
        if !data.hives.get(id).is_some_and(|h| h.user_id == owner_id) {
            return Err(not_found(Collection::Hives, id));
        }
        let record = data
            .hives
            .remove(id)
            .ok_or_else(|| not_found(Collection::Hives, id))?;
        let version = record.version + 1;
        self.publish_hive(
            owner_id,
            &ChangeEvent::Delete {
                id: id.to_string(),
                version,
            },
        );
        Ok(Removal { record, version })
    }
}

// ---------------------------------------------------------------------------
// Counter RPC
// ---------------------------------------------------------------------------

impl MemoryBackend {
    fn adjust_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
        delta: i64,
    ) -> Result<Apiary, BackendError> {
        let mut data = self.lock();
        let apiary = owned_apiary(&mut data, owner_id, apiary_id)?;
        let total_hives = apiary.total_hives + delta;
        if total_hives < 0 {
            return Err(BackendError::Rejected(format!(
                "check constraint failed: hive count of apiary {apiary_id} cannot go below zero"
            )));
        }
        let apiary = Self::set_hive_count(apiary, total_hives);
        self.publish_apiary(
            owner_id,
            &ChangeEvent::Update {
                record: apiary.clone(),
            },
        );
        Ok(apiary)
    }

    fn recount(&self, owner_id: &str, apiary_id: &str) -> Result<Apiary, BackendError> {
        let mut data = self.lock();
        let total_hives = data
            .hives
            .values()
            .filter(|h| h.apiary_id == apiary_id && h.user_id == owner_id)
            .count();
        let total_hives = i64::try_from(total_hives).unwrap_or(i64::MAX);
        let apiary = owned_apiary(&mut data, owner_id, apiary_id)?;
        let apiary = Self::set_hive_count(apiary, total_hives);
        self.publish_apiary(
            owner_id,
            &ChangeEvent::Update {
                record: apiary.clone(),
            },
        );
        Ok(apiary)
    }

    fn set_hive_count(apiary: &mut Apiary, total_hives: i64) -> Apiary {
        apiary.total_hives = total_hives;
        apiary.version += 1;
        apiary.updated_at = Utc::now();
        apiary.clone()
    }
}

#[async_trait]
impl CounterBackend for MemoryBackend {
    async fn increment_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError> {
        self.enter(Op::IncrementHiveCount).await?;
        self.adjust_hive_count(owner_id, apiary_id, 1)
    }

    async fn decrement_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError> {
        self.enter(Op::DecrementHiveCount).await?;
        self.adjust_hive_count(owner_id, apiary_id, -1)
    }

    async fn recount_hives(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError> {
        self.enter(Op::RecountHives).await?;
        self.recount(owner_id, apiary_id)
    }
}

// ---------------------------------------------------------------------------
// Change feeds
// ---------------------------------------------------------------------------

#[async_trait]
impl ChangeFeed<Apiary> for MemoryBackend {
    async fn subscribe(&self, owner_id: &str) -> Result<FeedHandle<Apiary>, BackendError> {
        self.enter(Op::Subscribe(Collection::Apiaries)).await?;
        Ok(self.apiary_feed.subscribe(owner_id))
    }

    fn unsubscribe(&self, id: FeedId) {
        self.apiary_feed.unsubscribe(id);
    }
}

#[async_trait]
impl ChangeFeed<Hive> for MemoryBackend {
    async fn subscribe(&self, owner_id: &str) -> Result<FeedHandle<Hive>, BackendError> {
        self.enter(Op::Subscribe(Collection::Hives)).await?;
        Ok(self.hive_feed.subscribe(owner_id))
    }

    fn unsubscribe(&self, id: FeedId) {
        self.hive_feed.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OWNER: &str = "usr-00000001";

    fn draft(name: &str) -> NewApiary {
        NewApiary {
            name: name.into(),
            location: "Arusha".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_echoes_client_ref_and_publishes() {
        let backend = MemoryBackend::new();
        let mut feed = backend.apiary_feed.subscribe(OWNER);
        let apiary = CollectionBackend::<Apiary>::create(&backend, OWNER, &draft("Home"), "tmp-00000001")
            .await
            .unwrap();
        assert_eq!(apiary.client_ref.as_deref(), Some("tmp-00000001"));
        assert_eq!(apiary.version, 1);
        assert!(matches!(feed.events.try_recv(), Ok(ChangeEvent::Insert { .. })));
    }

    #[tokio::test]
    async fn scripted_failure_is_consumed_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(Op::List(Collection::Apiaries), BackendError::Timeout);
        assert_eq!(
            CollectionBackend::<Apiary>::list(&backend, OWNER).await,
            Err(BackendError::Timeout)
        );
        assert!(CollectionBackend::<Apiary>::list(&backend, OWNER).await.is_ok());
        assert_eq!(backend.calls(Op::List(Collection::Apiaries)), 2);
    }

    #[tokio::test]
    async fn decrement_below_zero_is_rejected() {
        let backend = MemoryBackend::new();
        let apiary = CollectionBackend::<Apiary>::create(&backend, OWNER, &draft("Home"), "tmp-1")
            .await
            .unwrap();
        let err = backend.decrement_hive_count(OWNER, &apiary.id).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
        let held = backend.apiary(&apiary.id).unwrap();
        assert_eq!((held.total_hives, held.version), (0, 1));
    }

    #[tokio::test]
    async fn recount_counts_hives_held_right_now() {
        let backend = MemoryBackend::new();
        let apiary = CollectionBackend::<Apiary>::create(&backend, OWNER, &draft("Home"), "tmp-1")
            .await
            .unwrap();
        let hive = NewHive {
            apiary_id: apiary.id.clone(),
            name: "A1".into(),
            ..Default::default()
        };
        CollectionBackend::<Hive>::create(&backend, OWNER, &hive, "tmp-2")
            .await
            .unwrap();

        let recounted = backend.recount_hives(OWNER, &apiary.id).await.unwrap();
        assert_eq!((recounted.total_hives, recounted.version), (1, 2));
    }

    #[tokio::test]
    async fn delete_returns_the_removed_record() {
        let backend = MemoryBackend::new();
        let apiary = CollectionBackend::<Apiary>::create(&backend, OWNER, &draft("Home"), "tmp-1")
            .await
            .unwrap();
        let removal = CollectionBackend::<Apiary>::delete(&backend, OWNER, &apiary.id)
            .await
            .unwrap();
        assert_eq!(removal.record.id, apiary.id);
        assert_eq!(removal.version, 2);
        assert!(backend.apiary(&apiary.id).is_none());
    }

    #[tokio::test]
    async fn hive_create_checks_parent() {
        let backend = MemoryBackend::new();
        let draft = NewHive {
            apiary_id: "apy-missing0".into(),
            name: "A1".into(),
            ..Default::default()
        };
        let err = CollectionBackend::<Hive>::create(&backend, OWNER, &draft, "tmp-1")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn held_call_waits_for_release() {
        let backend = std::sync::Arc::new(MemoryBackend::new());
        let gate = backend.hold_next(Op::List(Collection::Hives));
        let task = tokio::spawn({
            let backend = std::sync::Arc::clone(&backend);
            async move { CollectionBackend::<Hive>::list(&*backend, OWNER).await }
        });
        tokio::task::yield_now().await;
        assert!(!task.is_finished());
        gate.release();
        assert_eq!(task.await.unwrap(), Ok(Vec::new()));
    }
}
