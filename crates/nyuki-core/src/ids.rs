//! ID prefixes and random ID generation.
//!
//! IDs look like `hiv-a3f8b2c1`: a three-letter prefix, a dash, and 8 hex chars.

use std::sync::atomic::{AtomicU32, Ordering};

pub const PREFIX_APIARY: &str = "apy";
pub const PREFIX_HIVE: &str = "hiv";
pub const PREFIX_USER: &str = "usr";
/// Client-generated correlation ids for optimistic creates.
pub const PREFIX_CORRELATION: &str = "tmp";

pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_APIARY,
    PREFIX_HIVE,
    PREFIX_USER,
    PREFIX_CORRELATION,
];

static FALLBACK_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a prefixed random ID.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", random_hex(4))
}

/// `n` random bytes rendered as lowercase hex.
///
/// Falls back to a clock/counter mix if the OS RNG is unavailable; ids only
/// need to be unique, not unpredictable.
#[must_use]
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    if getrandom::fill(&mut bytes).is_err() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.subsec_nanos());
        let mixed = nanos ^ FALLBACK_COUNTER.fetch_add(0x9e37_79b9, Ordering::Relaxed);
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = mixed.rotate_left(u32::try_from(i * 8).unwrap_or(0)).to_le_bytes()[0];
        }
    }
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Whether `id` was generated client-side for an optimistic create.
#[must_use]
pub fn is_correlation_id(id: &str) -> bool {
    id.strip_prefix(PREFIX_CORRELATION)
        .is_some_and(|rest| rest.starts_with('-'))
}
