//! # nyuki-sync
//!
//! Client-side synchronization of the apiary and hive collections.
//!
//! - [`EntityStore`]: per-collection cache with optimistic writes, per-id
//!   ordering, and a version rule for everything arriving from the backend
//! - [`SubscriptionBridge`]: routes a backend change feed into a store
//! - [`CounterMaintainer`]: keeps `Apiary::total_hives` in step with hive
//!   writes through the backend's atomic counter calls
//! - [`NyukiClient`]: wires the above to a `SessionManager`
//! - `test_support::MemoryBackend`: a scriptable in-memory backend, behind
//!   the `test-support` feature

pub mod backend;
pub mod bridge;
pub mod client;
pub mod counter;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod hooks;
pub mod pending;
mod queue;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backend::{
    ChangeFeed, CollectionBackend, CounterBackend, FeedHandle, FeedId, Removal, Revision,
};
pub use bridge::SubscriptionBridge;
pub use client::{Backends, NyukiClient};
pub use counter::CounterMaintainer;
pub use dashboard::{Dashboard, RecentHive};
pub use error::{ConflictDiscard, CounterDriftWarning, CounterOp, FetchError, WriteError};
pub use feed::FeedRegistry;
pub use hooks::{Committed, WriteHook};
pub use pending::PendingWrite;
pub use store::{CollectionSnapshot, EntityStore};
