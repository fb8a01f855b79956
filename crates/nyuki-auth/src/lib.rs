//! # nyuki-auth
//!
//! Session lifecycle for the Nyuki client.
//!
//! Provides the [`SessionManager`] state machine (restore, sign in/up/out,
//! expiry), persistence of the session token through a [`TokenStore`]
//! (OS keychain with a credentials-file fallback), best-effort token claim
//! decoding, and the [`AuthBackend`] contract the manager talks to.

pub mod backend;
pub mod claims;
pub mod error;
pub mod manager;
pub mod scope;
pub mod token_store;

pub use backend::{AuthBackend, SignUpAccount};
pub use claims::TokenClaims;
pub use error::{AuthError, AuthWarning};
pub use manager::{SessionManager, SessionSnapshot, SignUpOutcome};
pub use scope::SessionScoped;
pub use token_store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
