//! The authentication half of the backend contract.

use async_trait::async_trait;
use nyuki_core::entities::{Profile, Session};
use nyuki_core::errors::BackendError;
use nyuki_core::updates::profile::ProfilePatch;

/// Result of creating an account.
///
/// `session` is `None` when the backend requires the email to be confirmed
/// before the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpAccount {
    pub user_id: String,
    pub email: String,
    pub session: Option<Session>,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpAccount, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// Revoke `token` server-side.
    async fn sign_out(&self, token: &str) -> Result<(), BackendError>;

    /// Resolve a persisted token. `Ok(None)` means the token is no longer valid.
    async fn restore_session(&self, token: &str) -> Result<Option<Session>, BackendError>;

    /// `Ok(None)` when the user has no profile row.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError>;

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, BackendError>;

    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, BackendError>;
}
