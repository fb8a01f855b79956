//! Apiary patch builder.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiaryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl ApiaryPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.description.is_none()
            && self.notes.is_none()
    }
}

pub struct ApiaryPatchBuilder(ApiaryPatch);

impl ApiaryPatchBuilder {
    pub fn new() -> Self {
        Self(ApiaryPatch::default())
    }

    pub fn name(mut self, val: impl Into<String>) -> Self {
        self.0.name = Some(val.into());
        self
    }

    pub fn location(mut self, val: impl Into<String>) -> Self {
        self.0.location = Some(val.into());
        self
    }

    pub fn description(mut self, val: Option<String>) -> Self {
        self.0.description = Some(val);
        self
    }

    pub fn notes(mut self, val: Option<String>) -> Self {
        self.0.notes = Some(val);
        self
    }

    pub fn build(self) -> ApiaryPatch {
        self.0
    }
}

impl Default for ApiaryPatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}
