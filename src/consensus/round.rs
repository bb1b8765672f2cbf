//! Round records.
//!
//! Rounds are monotone integer labels on events; -1 means "not resolvable"
//! (the event or one of its ancestors is unknown). The core computes round
//! numbers and witness status; fame values are written by the downstream
//! ordering pass through the same records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::consensus::event::EventId;

/// The round reached by an event's parents.
///
/// `is_root` marks that the dominant parent was the creator's root rather
/// than a stored event, which forces a round increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRoundInfo {
    pub round: i64,
    pub is_root: bool,
}

impl ParentRoundInfo {
    /// The value returned for events the graph does not know.
    pub fn unresolved() -> Self {
        ParentRoundInfo {
            round: -1,
            is_root: false,
        }
    }
}

/// Per-event entry inside a round record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEvent {
    pub witness: bool,
    /// Decided by the ordering pass; `None` until then
    pub famous: Option<bool>,
}

/// All events labelled with one round number.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundInfo {
    events: HashMap<EventId, RoundEvent>,
}

impl RoundInfo {
    /// Record an event of this round.
    pub fn add_event(&mut self, id: EventId, witness: bool) {
        self.events.insert(
            id,
            RoundEvent {
                witness,
                famous: None,
            },
        );
    }

    /// The round's witnesses, in unspecified order.
    pub fn witnesses(&self) -> Vec<EventId> {
        self.events
            .iter()
            .filter(|(_, e)| e.witness)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn events(&self) -> &HashMap<EventId, RoundEvent> {
        &self.events
    }

    /// Set a witness's fame. No-op for unknown ids.
    pub fn decide_fame(&mut self, id: &EventId, famous: bool) {
        if let Some(e) = self.events.get_mut(id) {
            e.famous = Some(famous);
        }
    }
}
