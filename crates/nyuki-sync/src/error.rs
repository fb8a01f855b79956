use std::fmt;

use nyuki_core::enums::Collection;
use nyuki_core::errors::BackendError;
use serde::Serialize;
use thiserror::Error;

/// A collection fetch (or feed subscription) that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("fetch failed: {0}")]
    Transport(String),

    #[error("fetch timed out")]
    Timeout,

    #[error("store was torn down before the fetch completed")]
    TornDown,
}

impl From<BackendError> for FetchError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Timeout => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}

/// A local write that was not committed. The optimistic change has already
/// been reverted by the time the caller sees this.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("{collection} record not found: {id}")]
    NotFound { collection: Collection, id: String },

    #[error("{field} references unknown record {id}")]
    InvalidReference { field: &'static str, id: String },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("write failed: {0}")]
    Transport(String),

    #[error("write timed out")]
    Timeout,

    #[error("no active session for this store")]
    TornDown,
}

impl WriteError {
    pub(crate) fn from_backend(collection: Collection, error: BackendError) -> Self {
        match error {
            BackendError::Transport(reason) => Self::Transport(reason),
            BackendError::Timeout => Self::Timeout,
            BackendError::NotFound { id, .. } => Self::NotFound { collection, id },
            BackendError::Rejected(reason) => Self::Rejected(reason),
            other => Self::Rejected(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterOp {
    Increment,
    Decrement,
}

impl fmt::Display for CounterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Increment => "increment",
            Self::Decrement => "decrement",
        })
    }
}

/// The hive counter RPC failed after the hive mutation itself committed.
///
/// Never returned to callers; logged, kept for inspection, and reconciled by
/// the next fetch or pushed apiary event.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("hive count of apiary {apiary_id} may be stale ({operation} failed: {reason})")]
pub struct CounterDriftWarning {
    pub apiary_id: String,
    pub operation: CounterOp,
    pub reason: String,
}

/// Why an incoming record or event was not applied. Observable for debugging,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConflictDiscard {
    /// Older than the version already held.
    Stale {
        id: String,
        incoming: i64,
        current: i64,
    },
    /// Same version as the one already held.
    Duplicate { id: String, version: i64 },
    /// Owned by a different user than the store is scoped to.
    ForeignOwner { id: String, owner_id: String },
    /// The store was torn down or re-scoped since the event was produced.
    Detached { id: String },
}

impl ConflictDiscard {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Stale { id, .. }
            | Self::Duplicate { id, .. }
            | Self::ForeignOwner { id, .. }
            | Self::Detached { id } => id,
        }
    }
}

impl fmt::Display for ConflictDiscard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale {
                id,
                incoming,
                current,
            } => write!(f, "{id}: stale version {incoming} (holding {current})"),
            Self::Duplicate { id, version } => write!(f, "{id}: duplicate version {version}"),
            Self::ForeignOwner { id, owner_id } => write!(f, "{id}: owned by {owner_id}"),
            Self::Detached { id } => write!(f, "{id}: store detached"),
        }
    }
}
