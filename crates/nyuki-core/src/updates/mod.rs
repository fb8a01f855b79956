//! Patch builder types for entity updates.
//!
//! Each builder produces a patch struct with `Option` fields. Only `Some` fields
//! are applied, both to the optimistic local copy and in the backend's dynamic
//! UPDATE. `Option<Option<T>>` fields distinguish "leave alone" from "clear".

pub mod apiary;
pub mod hive;
pub mod profile;
