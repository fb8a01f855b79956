//! General application configuration.

use serde::{Deserialize, Serialize};

const fn default_recent_hives_limit() -> usize {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Number of recently created hives shown on the dashboard.
    #[serde(default = "default_recent_hives_limit")]
    pub recent_hives_limit: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            recent_hives_limit: default_recent_hives_limit(),
        }
    }
}
