use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Collection, HiveHealth};
use crate::errors::CoreError;
use crate::record::SyncRecord;
use crate::updates::hive::HivePatch;

/// Sensor readings attached to a hive. Opaque to the sync core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HiveMetrics {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub weight: Option<f64>,
}

/// A hive, always placed in exactly one apiary of the same owner.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Hive {
    pub id: String,
    pub user_id: String,
    pub apiary_id: String,
    pub name: String,
    pub queen_age: Option<i64>,
    pub queen_color: Option<String>,
    pub health: HiveHealth,
    pub notes: Option<String>,
    pub metrics: HiveMetrics,
    pub version: i64,
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a hive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NewHive {
    pub apiary_id: String,
    pub name: String,
    pub queen_age: Option<i64>,
    pub queen_color: Option<String>,
    pub health: HiveHealth,
    pub notes: Option<String>,
    pub metrics: HiveMetrics,
}

impl SyncRecord for Hive {
    type Draft = NewHive;
    type Patch = HivePatch;

    const COLLECTION: Collection = Collection::Hives;

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

    fn placeholder(owner_id: &str, client_ref: &str, draft: &NewHive, now: DateTime<Utc>) -> Self {
        Self {
            id: client_ref.to_string(),
            user_id: owner_id.to_string(),
            apiary_id: draft.apiary_id.clone(),
            name: draft.name.clone(),
            queen_age: draft.queen_age,
            queen_color: draft.queen_color.clone(),
            health: draft.health,
            notes: draft.notes.clone(),
            metrics: draft.metrics.clone(),
            version: 0,
            client_ref: Some(client_ref.to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &HivePatch) {
        if let Some(apiary_id) = &patch.apiary_id {
            self.apiary_id.clone_from(apiary_id);
        }
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(queen_age) = patch.queen_age {
            self.queen_age = queen_age;
        }
        if let Some(queen_color) = &patch.queen_color {
            self.queen_color.clone_from(queen_color);
        }
        if let Some(health) = patch.health {
            self.health = health;
        }
        if let Some(notes) = &patch.notes {
            self.notes.clone_from(notes);
        }
        if let Some(metrics) = &patch.metrics {
            self.metrics = metrics.clone();
        }
    }

    fn validate_draft(draft: &NewHive) -> Result<(), CoreError> {
        super::require_non_empty("name", &draft.name)?;
        super::require_non_empty("apiary_id", &draft.apiary_id)
    }
}
