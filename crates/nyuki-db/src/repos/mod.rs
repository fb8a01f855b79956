//! Repository modules. Each adds methods to `NyukiService` via
//! `impl NyukiService` blocks.

pub mod account;
pub mod apiary;
pub mod counter;
pub mod hive;
pub mod profile;
