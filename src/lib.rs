//! # Weft
//!
//! The core of a Hashgraph consensus engine:
//! - **Event DAG** — signed events with at most two parents (self-parent by
//!   the same creator, other-parent by a different one), content-addressed
//!   by a domain-separated BLAKE3 hash
//! - **Ancestry coordinates** — per-event, participant-indexed vectors of
//!   `(index, id)` pairs summarizing reachability frontiers, maintained
//!   incrementally at insert time
//! - **Predicate engine** — ancestor, self-ancestor, see and strongly-see,
//!   answered in O(N) from the coordinate vectors instead of DAG walks
//! - **Round engine** — parent-round, witness and round assignment, driven
//!   by strongly-seeing a supermajority of the previous round's witnesses
//!
//! Fame voting and final total ordering are a downstream pass built on this
//! core's public surface; the store declares the operations they will need.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod store;

/// Protocol constants
pub mod constants {
    /// Default capacity of each predicate memoization cache
    pub const DEFAULT_CACHE_SIZE: usize = 10_000;
}

/// 32-byte hash used throughout the protocol
pub type Hash = [u8; 32];

/// Compute a domain-separated BLAKE3 hash.
///
/// The domain MUST be valid UTF-8 (all weft domains use ASCII).
/// Panics at runtime if domain is not valid UTF-8 — this is a programming error.
pub fn hash_domain(domain: &[u8], data: &[u8]) -> Hash {
    let domain_str = std::str::from_utf8(domain).expect("hash_domain: domain must be valid UTF-8");
    let mut hasher = blake3::Hasher::new_derive_key(domain_str);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
