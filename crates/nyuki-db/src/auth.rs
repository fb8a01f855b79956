//! `AuthBackend` over the account and profile repos.

use async_trait::async_trait;
use nyuki_auth::{AuthBackend, SignUpAccount};
use nyuki_core::entities::{Profile, Session};
use nyuki_core::errors::BackendError;
use nyuki_core::updates::profile::ProfilePatch;

use crate::service::NyukiService;

#[async_trait]
impl AuthBackend for NyukiService {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpAccount, BackendError> {
        if self.find_user_by_email(email).await?.is_some() {
            return Err(BackendError::AccountExists(email.to_string()));
        }
        let user = self.insert_user(email, password).await?;
        let session = if user.email_verified {
            Some(self.insert_session(&user).await?)
        } else {
            None
        };
        Ok(SignUpAccount {
            user_id: user.id,
            email: user.email,
            session,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let user = self
            .find_user_by_email(email)
            .await?
            .filter(|user| user.password_matches(password))
            .ok_or(BackendError::InvalidCredentials)?;
        if !user.email_verified {
            return Err(BackendError::EmailUnverified(user.email));
        }
        Ok(self.insert_session(&user).await?)
    }

    async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        if !self.delete_session(token).await? {
            tracing::debug!("sign-out for an unknown session token");
        }
        Ok(())
    }

    async fn restore_session(&self, token: &str) -> Result<Option<Session>, BackendError> {
        let Some(claims) = self.signer().verify(token) else {
            tracing::debug!("restore with a token this backend did not sign");
            return Ok(None);
        };
        let session = self.find_session(token).await?;
        Ok(session.filter(|s| s.user_id == claims.sub))
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        Ok(self.get_profile(user_id).await?)
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, BackendError> {
        Ok(self.insert_profile(profile).await?)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, BackendError> {
        Ok(self.update_profile_fields(user_id, patch).await?)
    }
}
