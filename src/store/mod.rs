//! Event and round storage.
//!
//! Provides the `Store` trait the consensus core reads and writes through,
//! an in-memory implementation, and a sled-backed persistent one.
//! Participants are keyed by signing-key fingerprint throughout.

use std::collections::HashMap;

use crate::consensus::event::{Event, EventId, Root};
use crate::consensus::round::RoundInfo;
use crate::Hash;

mod inmem;
mod sled_store;

pub use inmem::InmemStore;
pub use sled_store::SledStore;

/// Errors from store operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unknown participant")]
    UnknownParticipant,
}

/// Storage capability set consumed by the consensus core.
///
/// The round-record and consensus-event operations are written by the
/// downstream ordering pass; the core itself only reads
/// `round_witnesses` and declares the rest.
pub trait Store: Send + Sync {
    /// Configured capacity for the core's predicate caches.
    fn cache_size(&self) -> usize;

    fn get_event(&self, id: &EventId) -> Result<Option<Event>, StoreError>;

    /// Insert or overwrite an event (back-propagation re-writes ancestors).
    fn set_event(&self, event: &Event) -> Result<(), StoreError>;

    fn get_root(&self, creator: &Hash) -> Result<Option<Root>, StoreError>;

    /// The creator's latest event id, or `(root.x, true)` when the creator
    /// has no events yet.
    fn last_from(&self, creator: &Hash) -> Result<(EventId, bool), StoreError>;

    /// Resolve `(creator, index)` to an event id.
    fn participant_event(&self, creator: &Hash, index: i64)
        -> Result<Option<EventId>, StoreError>;

    fn get_round(&self, round: i64) -> Result<Option<RoundInfo>, StoreError>;

    fn set_round(&self, round: i64, info: &RoundInfo) -> Result<(), StoreError>;

    /// Witnesses of a round; empty when the round is unknown.
    fn round_witnesses(&self, round: i64) -> Result<Vec<EventId>, StoreError> {
        Ok(self
            .get_round(round)?
            .map(|info| info.witnesses())
            .unwrap_or_default())
    }

    /// All events of a round; empty when the round is unknown.
    fn round_events(&self, round: i64) -> Result<Vec<EventId>, StoreError> {
        Ok(self
            .get_round(round)?
            .map(|info| info.events().keys().copied().collect())
            .unwrap_or_default())
    }

    /// Greatest round number with a stored record.
    fn last_round(&self) -> Result<Option<i64>, StoreError>;

    /// Latest known event index per dense participant id (-1 for none).
    fn known(&self) -> Result<HashMap<usize, i64>, StoreError>;

    fn consensus_events(&self) -> Result<Vec<EventId>, StoreError>;

    fn add_consensus_event(&self, id: &EventId) -> Result<(), StoreError>;

    /// Drop all events and rounds and install a fresh set of roots.
    fn reset(&self, roots: HashMap<Hash, Root>) -> Result<(), StoreError>;
}
