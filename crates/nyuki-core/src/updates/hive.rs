//! Hive patch builder.

use serde::Serialize;

use crate::entities::HiveMetrics;
use crate::enums::HiveHealth;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HivePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apiary_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queen_age: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queen_color: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HiveHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HiveMetrics>,
}

impl HivePatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.apiary_id.is_none()
            && self.name.is_none()
            && self.queen_age.is_none()
            && self.queen_color.is_none()
            && self.health.is_none()
            && self.notes.is_none()
            && self.metrics.is_none()
    }
}

pub struct HivePatchBuilder(HivePatch);

impl HivePatchBuilder {
    pub fn new() -> Self {
        Self(HivePatch::default())
    }

    /// Move the hive to another apiary.
    pub fn apiary_id(mut self, val: impl Into<String>) -> Self {
        self.0.apiary_id = Some(val.into());
        self
    }

    pub fn name(mut self, val: impl Into<String>) -> Self {
        self.0.name = Some(val.into());
        self
    }

    pub fn queen_age(mut self, val: Option<i64>) -> Self {
        self.0.queen_age = Some(val);
        self
    }

    pub fn queen_color(mut self, val: Option<String>) -> Self {
        self.0.queen_color = Some(val);
        self
    }

    pub fn health(mut self, val: HiveHealth) -> Self {
        self.0.health = Some(val);
        self
    }

    pub fn notes(mut self, val: Option<String>) -> Self {
        self.0.notes = Some(val);
        self
    }

    pub fn metrics(mut self, val: HiveMetrics) -> Self {
        self.0.metrics = Some(val);
        self
    }

    pub fn build(self) -> HivePatch {
        self.0
    }
}

impl Default for HivePatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}
