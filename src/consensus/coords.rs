//! Ancestry coordinate vectors.
//!
//! Every event carries two fixed-length vectors indexed by dense
//! participant id: last-ancestors ("the greatest-index event of
//! participant p reachable from me") and first-descendants ("the
//! smallest-index event of participant p that reaches me"). All the graph
//! predicates reduce to comparisons over these vectors, so their sentinels
//! are chosen to make those comparisons fall out naturally: an unknown
//! ancestor has index -1 and an unset descendant has index `i64::MAX`.

use serde::{Deserialize, Serialize};

use crate::consensus::event::EventId;

/// One `(index, id)` slot of a coordinate vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub index: i64,
    pub id: EventId,
}

impl Coordinate {
    /// Last-ancestor sentinel: no event of this participant is reachable.
    pub fn unknown() -> Self {
        Coordinate {
            index: -1,
            id: EventId::zero(),
        }
    }

    /// First-descendant sentinel, +infinity for index comparisons.
    pub fn unset() -> Self {
        Coordinate {
            index: i64::MAX,
            id: EventId::zero(),
        }
    }

    /// True once a first-descendant slot holds a real event.
    pub fn is_set(&self) -> bool {
        self.index != i64::MAX
    }
}

/// Fixed-length vector of coordinates, one slot per participant id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateVector(Vec<Coordinate>);

impl CoordinateVector {
    /// Last-ancestors of an event with no known parents: all unknown.
    pub fn unknown_ancestors(n: usize) -> Self {
        CoordinateVector(vec![Coordinate::unknown(); n])
    }

    /// First-descendants of a fresh event: all unset.
    pub fn unset_descendants(n: usize) -> Self {
        CoordinateVector(vec![Coordinate::unset(); n])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Coordinate> {
        self.0.get(id)
    }

    /// Overwrite one slot. Out-of-range ids are ignored; vectors are always
    /// allocated at participant-set size before use.
    pub fn set(&mut self, id: usize, coord: Coordinate) {
        if let Some(slot) = self.0.get_mut(id) {
            *slot = coord;
        }
    }

    /// Slot-wise maximum by index: after the merge each slot holds the
    /// coordinate with the greater index of the two vectors.
    pub fn merge_max(&mut self, other: &CoordinateVector) {
        for (slot, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            if theirs.index > slot.index {
                *slot = *theirs;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.0.iter()
    }
}
