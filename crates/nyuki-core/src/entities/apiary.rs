use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Collection;
use crate::errors::CoreError;
use crate::record::SyncRecord;
use crate::updates::apiary::ApiaryPatch;

/// A bee yard. `total_hives` is maintained by the backend's atomic counter
/// operations and is never computed on the client.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Apiary {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub total_hives: i64,
    pub version: i64,
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an apiary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewApiary {
    pub name: String,
    pub location: String,
    pub description: Option<String>,
    pub notes: Option<String>,
}

impl SyncRecord for Apiary {
    type Draft = NewApiary;
    type Patch = ApiaryPatch;

    const COLLECTION: Collection = Collection::Apiaries;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn client_ref(&self) -> Option<&str> {
        self.client_ref.as_deref()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn placeholder(owner_id: &str, client_ref: &str, draft: &NewApiary, now: DateTime<Utc>) -> Self {
        Self {
            id: client_ref.to_string(),
            user_id: owner_id.to_string(),
            name: draft.name.clone(),
            location: draft.location.clone(),
            description: draft.description.clone(),
            notes: draft.notes.clone(),
            total_hives: 0,
            version: 0,
            client_ref: Some(client_ref.to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &ApiaryPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(location) = &patch.location {
            self.location.clone_from(location);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(notes) = &patch.notes {
            self.notes.clone_from(notes);
        }
    }

    fn validate_draft(draft: &NewApiary) -> Result<(), CoreError> {
        super::require_non_empty("name", &draft.name)?;
        super::require_non_empty("location", &draft.location)
    }
}
