pub mod apiary;
pub mod auth;
pub mod hive;
pub mod profile;

pub use apiary::ApiaryCommands;
pub use auth::AuthCommands;
pub use hive::HiveCommands;
pub use profile::ProfileCommands;
