use nyuki_core::errors::BackendError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account already exists for {0}")]
    AccountExists(String),

    #[error("email address {0} has not been verified yet")]
    EmailUnverified(String),

    #[error("another sign-in or sign-up is already in progress")]
    Busy,

    #[error("already signed in; sign out first")]
    AlreadySignedIn,

    #[error("not authenticated — run `nyuki auth login`")]
    NotAuthenticated,

    #[error("session expired — run `nyuki auth login` to sign in again")]
    TokenExpired,

    #[error("token store error: {0}")]
    TokenStoreError(String),

    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for AuthError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::InvalidCredentials => Self::InvalidCredentials,
            BackendError::AccountExists(email) => Self::AccountExists(email),
            BackendError::EmailUnverified(email) => Self::EmailUnverified(email),
            BackendError::Unauthorized => Self::NotAuthenticated,
            other => Self::Backend(other),
        }
    }
}

/// Non-fatal outcome of an auth operation that otherwise succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthWarning {
    /// The account exists and is usable, but its profile row was not written.
    #[error("account created, but the profile could not be saved: {0}")]
    ProfileNotCreated(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_refusals_map_to_auth_variants() {
        assert_eq!(
            AuthError::from(BackendError::InvalidCredentials),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::from(BackendError::AccountExists("a@b.c".into())),
            AuthError::AccountExists("a@b.c".into())
        );
        assert_eq!(
            AuthError::from(BackendError::Unauthorized),
            AuthError::NotAuthenticated
        );
    }

    #[test]
    fn transport_errors_stay_backend_errors() {
        let err = AuthError::from(BackendError::Timeout);
        assert_eq!(err, AuthError::Backend(BackendError::Timeout));
        assert!(err.to_string().contains("timed out"));
    }
}
