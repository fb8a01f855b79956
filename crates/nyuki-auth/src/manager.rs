//! The session state machine.
//!
//! ```text
//! unauthenticated → authenticating → authenticated → signing_out → unauthenticated
//! ```
//!
//! All state lives behind one `std::sync::Mutex` that is never held across an
//! `.await`. Each transition happens inside a single critical section and is
//! published to watchers as a full [`SessionSnapshot`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use nyuki_config::SessionConfig;
use nyuki_core::entities::{Profile, ProfileFields, Session};
use nyuki_core::enums::SessionPhase;
use nyuki_core::errors::BackendError;
use nyuki_core::identity::AuthIdentity;
use nyuki_core::updates::profile::ProfilePatch;
use tokio::sync::watch;

use crate::backend::AuthBackend;
use crate::claims::TokenClaims;
use crate::error::{AuthError, AuthWarning};
use crate::scope::SessionScoped;
use crate::token_store::TokenStore;

/// What session watchers see. Always a full snapshot, never a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// Startup restoration has finished, whatever its outcome. Lets callers
    /// tell "still checking" apart from "confirmed signed out".
    pub restored: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }
}

/// Result of a sign-up that created the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user_id: String,
    /// `None` when the email must be confirmed before signing in.
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// Set when the account is usable but something secondary failed.
    pub warning: Option<AuthWarning>,
}

struct State {
    phase: SessionPhase,
    session: Option<Session>,
    profile: Option<Profile>,
    restored: bool,
    restore_started: bool,
    /// Bumped whenever the live identity changes. Late results tagged with an
    /// older generation are dropped.
    generation: u64,
}

impl State {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            session: self.session.clone(),
            profile: self.profile.clone(),
            restored: self.restored,
        }
    }

    fn transition(&mut self, next: SessionPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid session transition {} -> {next}",
            self.phase
        );
        tracing::debug!(from = %self.phase, to = %next, "session transition");
        self.phase = next;
    }
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    tokens: Arc<dyn TokenStore>,
    config: SessionConfig,
    state: Mutex<State>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    scoped: Mutex<Vec<Arc<dyn SessionScoped>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        tokens: Arc<dyn TokenStore>,
        config: SessionConfig,
    ) -> Self {
        let state = State {
            phase: SessionPhase::Unauthenticated,
            session: None,
            profile: None,
            restored: false,
            restore_started: false,
            generation: 0,
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        Self {
            backend,
            tokens,
            config,
            state: Mutex::new(state),
            snapshot_tx,
            scoped: Mutex::new(Vec::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Subscribe to session changes (`onSessionChange`).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// The live session, for synchronous first render.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        let state = self.lock();
        (state.phase == SessionPhase::Authenticated)
            .then(|| state.session.clone())
            .flatten()
    }

    #[must_use]
    pub fn identity(&self) -> Option<AuthIdentity> {
        self.current().map(|s| s.to_identity())
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    #[must_use]
    pub fn is_restored(&self) -> bool {
        self.lock().restored
    }

    /// Resolve once startup restoration has finished.
    pub async fn wait_restored(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|snapshot| snapshot.restored).await;
    }

    /// Tie `resource` to the session: it is torn down on every sign-out or expiry.
    pub fn register_scoped(&self, resource: Arc<dyn SessionScoped>) {
        self.scoped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource);
    }

    // -----------------------------------------------------------------------
    // Restore
    // -----------------------------------------------------------------------

    /// Load the persisted session, once per manager.
    ///
    /// Never fails: a missing, expired, rejected, or unreachable session all
    /// end in `unauthenticated`. Bounded by `session.restore_timeout_ms`.
    /// Returns whether the session is authenticated afterwards.
    pub async fn restore(&self) -> bool {
        {
            let mut state = self.lock();
            if state.restore_started {
                return state.phase == SessionPhase::Authenticated;
            }
            state.restore_started = true;
        }

        let resolved =
            match tokio::time::timeout(self.config.restore_timeout(), self.resolve_persisted())
                .await
            {
                Ok(Ok(session)) => session,
                Ok(Err(error)) => {
                    tracing::debug!(%error, "session restore failed; continuing signed out");
                    None
                }
                Err(_) => {
                    tracing::debug!(
                        timeout_ms = self.config.restore_timeout_ms,
                        "session restore timed out; continuing signed out"
                    );
                    None
                }
            };

        let authenticated = {
            let mut state = self.lock();
            let adopt = resolved.is_some() && state.phase == SessionPhase::Unauthenticated;
            if adopt {
                state.transition(SessionPhase::Authenticated);
                state.session = resolved;
                state.generation += 1;
            }
            state.restored = true;
            self.publish(&state);
            adopt
        };

        if authenticated {
            tracing::info!("session restored");
            self.load_profile().await;
        }
        authenticated
    }

    async fn resolve_persisted(&self) -> Result<Option<Session>, AuthError> {
        let Some(token) = self.tokens.load() else {
            return Ok(None);
        };

        // Tokens that do not decode are left for the backend to judge.
        if let Ok(claims) = TokenClaims::decode_unverified(&token)
            && claims.is_near_expiry(self.config.expiry_buffer_secs)
        {
            tracing::debug!(
                expires_at = %claims.expires_at(),
                "persisted token expires within {}s; discarding",
                self.config.expiry_buffer_secs
            );
            self.forget_token();
            return Ok(None);
        }

        match self.backend.restore_session(&token).await {
            Ok(Some(session)) => Ok(Some(session)),
            Ok(None) | Err(BackendError::Unauthorized) => {
                self.forget_token();
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Sign in / sign up
    // -----------------------------------------------------------------------

    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// `AuthError::Busy` if another attempt is in flight, `AlreadySignedIn` if a
    /// session is live, otherwise the backend's refusal mapped onto `AuthError`.
    /// A backend that does not answer within `session.restore_timeout_ms`
    /// fails the attempt with `BackendError::Timeout`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let attempt = self.begin_attempt()?;

        let session = self
            .bounded(self.backend.sign_in(email, password))
            .await
            .inspect_err(|error| tracing::info!(%error, email, "sign-in failed"))?;

        self.persist_token(&session.token);
        self.complete_attempt(attempt, Some(session.clone()), None);
        tracing::info!(user_id = %session.user_id, "signed in");

        self.load_profile().await;
        Ok(session)
    }

    /// Create an account and its profile.
    ///
    /// A failed profile insert does not fail the call: the account is usable,
    /// so the outcome carries [`AuthWarning::ProfileNotCreated`] instead.
    ///
    /// # Errors
    ///
    /// `AuthError::Busy`/`AlreadySignedIn` as for [`Self::sign_in`], or the
    /// backend's refusal to create the account. Bounded like `sign_in`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        fields: ProfileFields,
    ) -> Result<SignUpOutcome, AuthError> {
        let attempt = self.begin_attempt()?;

        let account = self
            .bounded(self.backend.sign_up(email, password))
            .await
            .inspect_err(|error| tracing::info!(%error, email, "sign-up failed"))?;

        let now = Utc::now();
        let draft = Profile {
            user_id: account.user_id.clone(),
            email: account.email.clone(),
            first_name: fields.first_name,
            last_name: fields.last_name,
            avatar_url: fields.avatar_url,
            created_at: now,
            updated_at: now,
        };
        let (profile, warning) = match self.bounded(self.backend.create_profile(&draft)).await {
            Ok(profile) => (Some(profile), None),
            Err(error) => {
                tracing::warn!(%error, user_id = %account.user_id, "account created but profile insert failed");
                (None, Some(AuthWarning::ProfileNotCreated(error.to_string())))
            }
        };

        if let Some(session) = &account.session {
            self.persist_token(&session.token);
        }
        self.complete_attempt(attempt, account.session.clone(), profile.clone());
        tracing::info!(
            user_id = %account.user_id,
            signed_in = account.session.is_some(),
            "account created"
        );

        Ok(SignUpOutcome {
            user_id: account.user_id,
            session: account.session,
            profile,
            warning,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        tokio::time::timeout(self.config.restore_timeout(), call)
            .await
            .unwrap_or(Err(BackendError::Timeout))
    }

    fn begin_attempt(&self) -> Result<PhaseGuard<'_>, AuthError> {
        let mut state = self.lock();
        match state.phase {
            SessionPhase::Authenticating | SessionPhase::SigningOut => Err(AuthError::Busy),
            SessionPhase::Authenticated => Err(AuthError::AlreadySignedIn),
            SessionPhase::Unauthenticated => {
                state.transition(SessionPhase::Authenticating);
                self.publish(&state);
                Ok(PhaseGuard {
                    manager: self,
                    armed: true,
                })
            }
        }
    }

    fn complete_attempt(
        &self,
        mut attempt: PhaseGuard<'_>,
        session: Option<Session>,
        profile: Option<Profile>,
    ) {
        attempt.armed = false;
        let mut state = self.lock();
        match session {
            Some(session) => {
                state.transition(SessionPhase::Authenticated);
                state.session = Some(session);
                state.profile = profile;
                state.generation += 1;
            }
            None => state.transition(SessionPhase::Unauthenticated),
        }
        self.publish(&state);
    }

    // -----------------------------------------------------------------------
    // Sign out / expiry
    // -----------------------------------------------------------------------

    /// End the session. Session-scoped resources are torn down first, while
    /// the phase still reads `authenticated`.
    ///
    /// A failed server-side revoke is logged; the local session is cleared
    /// regardless.
    ///
    /// # Errors
    ///
    /// `AuthError::Busy` while a sign-in, sign-up, or another sign-out is in flight.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.end_session("signed out").await
    }

    /// Tear the session down if its expiry has passed. Returns whether it did.
    pub async fn expire_if_due(&self) -> bool {
        let due = {
            let state = self.lock();
            state.phase == SessionPhase::Authenticated
                && state.session.as_ref().is_some_and(Session::is_expired)
        };
        due && self.end_session("expired").await.is_ok()
    }

    async fn end_session(&self, reason: &'static str) -> Result<(), AuthError> {
        match self.phase() {
            SessionPhase::Unauthenticated => return Ok(()),
            SessionPhase::Authenticating | SessionPhase::SigningOut => {
                return Err(AuthError::Busy);
            }
            SessionPhase::Authenticated => {}
        }

        self.teardown_scoped();

        let (session, guard) = {
            let mut state = self.lock();
            if state.phase != SessionPhase::Authenticated {
                return Err(AuthError::Busy);
            }
            state.transition(SessionPhase::SigningOut);
            state.generation += 1;
            self.publish(&state);
            (
                state.session.clone(),
                PhaseGuard {
                    manager: self,
                    armed: true,
                },
            )
        };

        self.forget_token();
        if let Some(session) = session {
            match tokio::time::timeout(
                self.config.restore_timeout(),
                self.backend.sign_out(&session.token),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(%error, "backend sign-out failed; local session cleared anyway");
                }
                Err(_) => tracing::warn!("backend sign-out timed out; local session cleared anyway"),
            }
        }

        drop(guard);
        tracing::info!(reason, "session ended");
        Ok(())
    }

    fn teardown_scoped(&self) {
        let resources = self
            .scoped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for resource in resources {
            resource.teardown();
        }
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    /// Apply `patch` to the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// `AuthError::NotAuthenticated` without a live session, otherwise the
    /// backend's error.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<Profile, AuthError> {
        let (user_id, generation) = self.live_identity().ok_or(AuthError::NotAuthenticated)?;
        let profile = self.backend.update_profile(&user_id, patch).await?;

        let mut state = self.lock();
        if state.generation == generation {
            state.profile = Some(profile.clone());
            self.publish(&state);
        }
        Ok(profile)
    }

    async fn load_profile(&self) {
        let Some((user_id, generation)) = self.live_identity() else {
            return;
        };
        let result = tokio::time::timeout(
            self.config.restore_timeout(),
            self.backend.fetch_profile(&user_id),
        )
        .await;
        match result {
            Ok(Ok(profile)) => {
                let mut state = self.lock();
                if state.generation == generation {
                    state.profile = profile;
                    self.publish(&state);
                }
            }
            Ok(Err(error)) => tracing::warn!(%error, user_id, "failed to load profile"),
            Err(_) => tracing::warn!(user_id, "profile load timed out"),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn live_identity(&self) -> Option<(String, u64)> {
        let state = self.lock();
        if state.phase != SessionPhase::Authenticated {
            return None;
        }
        state
            .session
            .as_ref()
            .map(|s| (s.user_id.clone(), state.generation))
    }

    fn persist_token(&self, token: &str) {
        if let Err(error) = self.tokens.store(token) {
            tracing::warn!(%error, "failed to persist session token; it will not survive a restart");
        }
    }

    fn forget_token(&self) {
        if let Err(error) = self.tokens.delete() {
            tracing::warn!(%error, "failed to remove persisted session token");
        }
    }

    fn publish(&self, state: &State) {
        self.snapshot_tx.send_replace(state.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the manager to `unauthenticated` when an in-flight transition is
/// abandoned (error return or a dropped future).
struct PhaseGuard<'a> {
    manager: &'a SessionManager,
    armed: bool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.manager.lock();
        if matches!(
            state.phase,
            SessionPhase::Authenticating | SessionPhase::SigningOut
        ) {
            state.transition(SessionPhase::Unauthenticated);
            state.session = None;
            state.profile = None;
            state.generation += 1;
            self.manager.publish(&state);
        }
    }
}
