//! # nyuki-core
//!
//! Core types, ID generation, and error types for Nyuki.
//!
//! This crate provides the foundational types shared across all Nyuki crates:
//! - Entity structs for the synchronized collections (apiaries, hives) and
//!   the account records (profile, session)
//! - Status enums, including the session state machine
//! - ID prefix constants and generation helpers
//! - Cross-cutting error types, including the backend error contract
//! - Patch builders for partial updates
//! - The change-feed event envelope
//! - The [`record::SyncRecord`] trait implemented by every synchronized entity

pub mod entities;
pub mod enums;
pub mod errors;
pub mod events;
pub mod identity;
pub mod ids;
pub mod record;
pub mod updates;
