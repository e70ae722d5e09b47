//! Fixed-seed hashing and the containers built on it.
//!
//! Re-exports *hashbrown* and *foldhash* so downstream crates can reach the
//! underlying types without an extra dependency edge.

use core::hash::Hash;

// -----------------------------------------------------------------------------
// Modules

mod hasher;

// -----------------------------------------------------------------------------
// Exports

pub use hasher::{FixedHashState, FixedHasher};

/// A [`hashbrown::HashMap`] seeded with [`FixedHashState`].
pub type HashMap<K, V, S = FixedHashState> = hashbrown::HashMap<K, V, S>;

/// A [`hashbrown::HashSet`] seeded with [`FixedHashState`].
pub type HashSet<T, S = FixedHashState> = hashbrown::HashSet<T, S>;

/// Hashes `value` with the process-stable [`FixedHashState`].
///
/// Two calls with equal inputs return equal hashes for the lifetime of the
/// process, no matter which thread or crate performs them.
///
/// # Examples
///
/// ```
/// use cw_utils::hash::fixed_hash;
///
/// assert_eq!(fixed_hash("heartbeat"), fixed_hash("heartbeat"));
/// assert_ne!(fixed_hash("heartbeat"), fixed_hash("watchdog"));
/// ```
#[inline]
pub fn fixed_hash<T: Hash>(value: T) -> u64 {
    use core::hash::BuildHasher;
    FixedHashState.hash_one(value)
}

// -----------------------------------------------------------------------------
// Re-export crates

pub use foldhash;
pub use hashbrown;

// -----------------------------------------------------------------------------
// Tests
