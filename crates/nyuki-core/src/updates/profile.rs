//! Profile patch builder.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
}

pub struct ProfilePatchBuilder(ProfilePatch);

impl ProfilePatchBuilder {
    pub fn new() -> Self {
        Self(ProfilePatch::default())
    }

    pub fn first_name(mut self, val: impl Into<String>) -> Self {
        self.0.first_name = Some(val.into());
        self
    }

    pub fn last_name(mut self, val: impl Into<String>) -> Self {
        self.0.last_name = Some(val.into());
        self
    }

    pub fn avatar_url(mut self, val: Option<String>) -> Self {
        self.0.avatar_url = Some(val);
        self
    }

    pub fn build(self) -> ProfilePatch {
        self.0
    }
}

impl Default for ProfilePatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}
