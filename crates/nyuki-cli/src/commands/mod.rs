pub mod apiary;
pub mod auth;
pub mod dashboard;
pub mod dispatch;
pub mod hive;
pub mod profile;
pub mod shared;
