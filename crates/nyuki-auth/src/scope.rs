/// A resource whose lifetime is bounded by the live session.
///
/// Registered with [`crate::SessionManager::register_scoped`]. `teardown` runs
/// synchronously while the session is still `authenticated`, before any
/// transition out of it, so nothing scoped to the old identity can observe
/// the next one.
pub trait SessionScoped: Send + Sync {
    /// Release everything tied to the ending session. Must not block.
    fn teardown(&self);
}
