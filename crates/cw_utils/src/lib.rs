//! Shared utilities for the Clockwork SDK crates.
//!
//! Currently this is the hashing layer: a fixed-seed hasher plus the hash
//! containers built on top of it. Task identities and event keys must hash
//! identically wherever they are computed inside one process, so every
//! container and every standalone hash in the SDK goes through
//! [`hash::FixedHashState`].

// -----------------------------------------------------------------------------
// Modules

pub mod hash;
