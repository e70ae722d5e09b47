//! The SDK-wide fixed-seed hasher.
//!
//! Built on the `foldhash` crate with a hard-coded seed, so hash values are
//! a pure function of the input within one build. Task identities and event
//! signatures rely on that: a hash computed at submission time must match
//! the one recomputed at lookup time.

use core::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// FixedHashState

/// The seed every [`FixedHashState`] shares.
const FIXED_HASH_STATE: FixedState = FixedState::with_seed(0x6D0B_A39C_51F2_8E47);

/// The hasher produced by [`FixedHashState`].
///
/// A type alias for [`foldhash::fast::FoldHasher`].
pub type FixedHasher = FoldHasher<'static>;

/// A [`BuildHasher`] whose output depends only on the hashed input.
///
/// Unlike `std`'s randomly seeded default state, two instances of this state
/// always agree, which makes the resulting hashes safe to store and compare
/// later in the process lifetime.
///
/// # Examples
///
/// ```
/// use core::hash::BuildHasher;
/// use cw_utils::hash::FixedHashState;
///
/// let a = FixedHashState.hash_one("tick");
/// let b = FixedHashState.hash_one("tick");
/// assert_eq!(a, b);
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use core::any::TypeId;
    use core::hash::BuildHasher;

    use super::FixedHashState;

    #[test]
    fn independent_states_agree() {
        let lhs = FixedHashState.hash_one(42_u64);
        let rhs = FixedHashState::default().hash_one(42_u64);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn type_ids_hash_distinctly() {
        let int = FixedHashState.hash_one(TypeId::of::<i32>());
        let string = FixedHashState.hash_one(TypeId::of::<String>());
        assert_ne!(int, string);
    }
}
