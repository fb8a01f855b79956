//! Change-feed event envelope.
//!
//! Backends push one `ChangeEvent` per committed mutation. Inserts and updates
//! carry the full record (whose `version` is the event's version marker);
//! deletes carry the id and the version the deletion was committed at.

use serde::{Deserialize, Serialize};

use crate::enums::ChangeKind;
use crate::record::SyncRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent<R> {
    Insert { record: R },
    Update { record: R },
    Delete { id: String, version: i64 },
}

impl<R: SyncRecord> ChangeEvent<R> {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Insert { record } | Self::Update { record } => record.id(),
            Self::Delete { id, .. } => id,
        }
    }

    #[must_use]
    pub fn version(&self) -> i64 {
        match self {
            Self::Insert { record } | Self::Update { record } => record.version(),
            Self::Delete { version, .. } => *version,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert { .. } => ChangeKind::Insert,
            Self::Update { .. } => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// The full record, if the event carries one.
    #[must_use]
    pub const fn record(&self) -> Option<&R> {
        match self {
            Self::Insert { record } | Self::Update { record } => Some(record),
            Self::Delete { .. } => None,
        }
    }
}
