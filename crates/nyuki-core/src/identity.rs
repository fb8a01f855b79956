use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lightweight authenticated user identity for cross-crate passing.
///
/// Produced by `nyuki-auth` from the live session, consumed by `nyuki-sync`
/// to scope fetches and change feeds. Contains only data fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuthIdentity {
    /// Owning user ID (from the token `sub` claim).
    pub user_id: String,
    /// Sign-in email of the user.
    pub email: String,
}
