//! [`NyukiClient`]: one session manager, the apiary and hive stores, their
//! change-feed bridges, and the hive counter, wired together.
//!
//! Everything scoped to the signed-in user is registered with the session
//! manager as a single [`SessionScoped`] resource, so every sign-out or
//! expiry tears it down before the session leaves `authenticated`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use nyuki_auth::{AuthBackend, AuthError, SessionManager, SessionScoped, SignUpOutcome, TokenStore};
use nyuki_config::NyukiConfig;
use nyuki_core::entities::{Apiary, Hive, NewApiary, NewHive, ProfileFields, Session};
use nyuki_core::updates::apiary::ApiaryPatch;
use nyuki_core::updates::hive::HivePatch;
use tokio::task::JoinHandle;

use crate::backend::{ChangeFeed, CollectionBackend, CounterBackend};
use crate::bridge::SubscriptionBridge;
use crate::counter::CounterMaintainer;
use crate::dashboard::{self, Dashboard};
use crate::error::{FetchError, WriteError};
use crate::pending::PendingWrite;
use crate::store::EntityStore;

/// Wall-clock and timer clocks differ slightly; wake a little after expiry.
const EXPIRY_SLACK: Duration = Duration::from_millis(50);

/// Every backend the client talks to.
pub struct Backends {
    pub auth: Arc<dyn AuthBackend>,
    pub apiaries: Arc<dyn CollectionBackend<Apiary>>,
    pub hives: Arc<dyn CollectionBackend<Hive>>,
    pub counters: Arc<dyn CounterBackend>,
    pub apiary_feed: Arc<dyn ChangeFeed<Apiary>>,
    pub hive_feed: Arc<dyn ChangeFeed<Hive>>,
}

impl Backends {
    /// Use one implementation for every role.
    pub fn shared<B>(backend: &Arc<B>) -> Self
    where
        B: AuthBackend
            + CollectionBackend<Apiary>
            + CollectionBackend<Hive>
            + CounterBackend
            + ChangeFeed<Apiary>
            + ChangeFeed<Hive>
            + 'static,
    {
        Self {
            auth: backend.clone(),
            apiaries: backend.clone(),
            hives: backend.clone(),
            counters: backend.clone(),
            apiary_feed: backend.clone(),
            hive_feed: backend.clone(),
        }
    }
}

#[derive(Default)]
struct Scope {
    /// Bumped by every teardown. An activation only proceeds while the
    /// generation it started under is current.
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

struct ScopedResources {
    apiaries: EntityStore<Apiary>,
    hives: EntityStore<Hive>,
    apiary_bridge: SubscriptionBridge<Apiary>,
    hive_bridge: SubscriptionBridge<Hive>,
    scope: Mutex<Scope>,
}

impl ScopedResources {
    fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Attach both stores to `owner_id` unless a teardown happened since
    /// `generation`.
    fn attach(&self, generation: u64, owner_id: &str) -> bool {
        let scope = self.lock();
        if scope.generation != generation {
            return false;
        }
        self.apiaries.attach(owner_id);
        self.hives.attach(owner_id);
        true
    }

    fn lock(&self) -> MutexGuard<'_, Scope> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionScoped for ScopedResources {
    fn teardown(&self) {
        let mut scope = self.lock();
        scope.generation += 1;
        if let Some(timer) = scope.expiry.take() {
            timer.abort();
        }
        // Stores first: a bridge that is still opening finds them detached.
        self.apiaries.teardown();
        self.hives.teardown();
        self.apiary_bridge.close();
        self.hive_bridge.close();
    }
}

pub struct NyukiClient {
    session: Arc<SessionManager>,
    resources: Arc<ScopedResources>,
    counter: Arc<CounterMaintainer>,
    recent_hives_limit: usize,
}

impl NyukiClient {
    #[must_use]
    pub fn new(backends: Backends, tokens: Arc<dyn TokenStore>, config: &NyukiConfig) -> Self {
        let session = Arc::new(SessionManager::new(
            backends.auth,
            tokens,
            config.session.clone(),
        ));
        let request_timeout = config.sync.request_timeout();

        let apiaries = EntityStore::new(backends.apiaries, config.sync.clone());
        let counter = Arc::new(CounterMaintainer::new(
            backends.counters,
            apiaries.clone(),
            request_timeout,
        ));
        let hives = EntityStore::with_hook(backends.hives, counter.clone(), config.sync.clone());

        let resources = Arc::new(ScopedResources {
            apiary_bridge: SubscriptionBridge::new(
                backends.apiary_feed,
                apiaries.clone(),
                request_timeout,
            ),
            hive_bridge: SubscriptionBridge::new(backends.hive_feed, hives.clone(), request_timeout),
            apiaries,
            hives,
            scope: Mutex::new(Scope::default()),
        });
        session.register_scoped(resources.clone());

        Self {
            session,
            resources,
            counter,
            recent_hives_limit: config.general.recent_hives_limit,
        }
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Restore the persisted session and, if one is live, load its data.
    /// Returns whether the client is signed in afterwards.
    pub async fn restore(&self) -> bool {
        let generation = self.resources.generation();
        let authenticated = self.session.restore().await;
        if authenticated {
            self.activate(generation).await;
        }
        authenticated
    }

    /// # Errors
    ///
    /// See [`SessionManager::sign_in`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let generation = self.resources.generation();
        let session = self.session.sign_in(email, password).await?;
        self.activate(generation).await;
        Ok(session)
    }

    /// # Errors
    ///
    /// See [`SessionManager::sign_up`].
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        fields: ProfileFields,
    ) -> Result<SignUpOutcome, AuthError> {
        let generation = self.resources.generation();
        let outcome = self.session.sign_up(email, password, fields).await?;
        if outcome.session.is_some() {
            self.activate(generation).await;
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// See [`SessionManager::sign_out`].
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.session.sign_out().await
    }

    /// Attach the stores to the live user, open both feeds, load both
    /// collections, and arm the expiry timer.
    ///
    /// Feeds open before the fetch; events arriving while it is in flight
    /// are replayed over its result. Feed and fetch failures are logged and
    /// leave the session usable.
    async fn activate(&self, generation: u64) {
        let Some(session) = self.session.current() else {
            return;
        };
        let owner_id = session.user_id.as_str();
        if !self.resources.attach(generation, owner_id) {
            tracing::debug!(owner_id, "session ended before activation");
            return;
        }

        let (apiary_feed, hive_feed) = tokio::join!(
            self.resources.apiary_bridge.open(owner_id),
            self.resources.hive_bridge.open(owner_id),
        );
        for (collection, result) in [("apiaries", apiary_feed), ("hives", hive_feed)] {
            if let Err(error) = result {
                tracing::warn!(collection, %error, "change feed unavailable; updates from other devices will not appear until refresh");
            }
        }

        if let Err(error) = self.refresh_for(owner_id).await {
            tracing::warn!(owner_id, %error, "initial fetch failed");
        }
        self.arm_expiry(generation, &session);
        tracing::info!(owner_id, "session activated");
    }

    fn arm_expiry(&self, generation: u64, session: &Session) {
        let delay = (session.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            + EXPIRY_SLACK;
        let manager = Arc::downgrade(&self.session);

        let mut scope = self.resources.lock();
        if scope.generation != generation {
            return;
        }
        if let Some(previous) = scope.expiry.take() {
            previous.abort();
        }
        scope.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = manager.upgrade() {
                // Expiry aborts this timer, so it has to finish on its own task.
                tokio::spawn(async move {
                    manager.expire_if_due().await;
                });
            }
        }));
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    /// Re-fetch both collections, then recount any apiary whose hive count
    /// drifted after a failed counter call.
    ///
    /// # Errors
    ///
    /// `FetchError::TornDown` without a live session, otherwise the first
    /// fetch failure; the other collection is still refreshed.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let identity = self.session.identity().ok_or(FetchError::TornDown)?;
        self.refresh_for(&identity.user_id).await
    }

    async fn refresh_for(&self, owner_id: &str) -> Result<(), FetchError> {
        let (apiaries, hives) = tokio::join!(
            self.resources.apiaries.fetch_all(owner_id),
            self.resources.hives.fetch_all(owner_id),
        );
        self.counter.repair(owner_id).await;
        apiaries?;
        hives?;
        Ok(())
    }

    pub fn create_apiary(&self, draft: NewApiary) -> PendingWrite<Apiary> {
        self.resources.apiaries.create(draft)
    }

    pub fn update_apiary(&self, id: &str, patch: ApiaryPatch) -> PendingWrite<Apiary> {
        self.resources.apiaries.update(id, patch)
    }

    /// Rejected while any known hive still sits in the apiary.
    pub fn delete_apiary(&self, id: &str) -> PendingWrite<()> {
        let occupied = self
            .resources
            .hives
            .snapshot()
            .iter()
            .filter(|hive| hive.apiary_id == id)
            .count();
        if occupied > 0 {
            return PendingWrite::failed(WriteError::Rejected(format!(
                "apiary {id} still has {occupied} hive(s); move or delete them first"
            )));
        }
        self.resources.apiaries.delete(id)
    }

    pub fn create_hive(&self, draft: NewHive) -> PendingWrite<Hive> {
        self.resources.hives.create(draft)
    }

    /// Setting `patch.apiary_id` moves the hive; both apiaries' counts follow.
    pub fn update_hive(&self, id: &str, patch: HivePatch) -> PendingWrite<Hive> {
        self.resources.hives.update(id, patch)
    }

    pub fn delete_hive(&self, id: &str) -> PendingWrite<()> {
        self.resources.hives.delete(id)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub fn apiaries(&self) -> &EntityStore<Apiary> {
        &self.resources.apiaries
    }

    #[must_use]
    pub fn hives(&self) -> &EntityStore<Hive> {
        &self.resources.hives
    }

    #[must_use]
    pub fn counter(&self) -> &CounterMaintainer {
        &self.counter
    }

    #[must_use]
    pub fn feeds_open(&self) -> bool {
        self.resources.apiary_bridge.is_open() && self.resources.hive_bridge.is_open()
    }

    #[must_use]
    pub fn dashboard(&self) -> Dashboard {
        dashboard::summarize(
            &self.resources.apiaries.snapshot(),
            &self.resources.hives.snapshot(),
            self.recent_hives_limit,
        )
    }

    #[must_use]
    pub fn hives_in_apiary(&self, apiary_id: &str) -> Vec<Hive> {
        dashboard::hives_in_apiary(&self.resources.hives.snapshot(), apiary_id)
    }
}
