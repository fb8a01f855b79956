//! Entity structs for all Nyuki domain objects.
//!
//! Each entity maps to a table in the embedded backend. All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema` for JSON output and schema
//! validation.

mod apiary;
mod hive;
mod profile;
mod session;

pub use apiary::{Apiary, NewApiary};
pub use hive::{Hive, HiveMetrics, NewHive};
pub use profile::{Profile, ProfileFields};
pub use session::Session;

use crate::errors::CoreError;

fn require_non_empty(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
