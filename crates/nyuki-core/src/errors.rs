//! Cross-cutting error types for Nyuki.
//!
//! `CoreError` covers validation and lookup failures that can originate in any
//! crate. `BackendError` is the error contract every backend implementation
//! (embedded store, remote service, test double) reports through; the sync
//! core maps it onto its own taxonomy (`AuthError`, `FetchError`, `WriteError`).

use thiserror::Error;

/// Errors that can be raised by any Nyuki crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        from: String,
        to: String,
    },

    /// Data failed validation (required fields, formats).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors reported by the authoritative backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The request never reached the backend or the connection broke.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend did not answer in time.
    #[error("backend request timed out")]
    Timeout,

    /// The addressed record does not exist (or is not visible to the caller).
    #[error("{collection} record not found: {id}")]
    NotFound { collection: String, id: String },

    /// The backend refused the write (constraint, foreign key, validation).
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// Email/password pair did not match an account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Sign-up for an email that already has an account.
    #[error("an account already exists for {0}")]
    AccountExists(String),

    /// Sign-in for an account whose email has not been confirmed.
    #[error("email address {0} has not been verified")]
    EmailUnverified(String),

    /// The session token is missing, expired, or revoked.
    #[error("session token is not valid")]
    Unauthorized,
}

impl BackendError {
    /// Whether the failure is a connectivity problem rather than a refusal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_transport_and_timeout() {
        assert!(BackendError::Transport("reset".into()).is_transient());
        assert!(BackendError::Timeout.is_transient());
        assert!(!BackendError::Rejected("fk".into()).is_transient());
        assert!(!BackendError::Unauthorized.is_transient());
    }

    #[test]
    fn not_found_message_names_collection() {
        let err = BackendError::NotFound {
            collection: "hives".into(),
            id: "hiv-00000001".into(),
        };
        assert_eq!(err.to_string(), "hives record not found: hiv-00000001");
    }
}
