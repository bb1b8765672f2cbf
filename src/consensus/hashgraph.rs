//! The hashgraph core: insertion pipeline, predicate engine, round engine.
//!
//! One logical task drives [`Hashgraph::insert_event`]; any number of tasks
//! may issue predicate and round queries, which take `&self` and memoize
//! through the bounded caches. Queries over events the graph does not know
//! degrade (false / -1 / `None`) instead of failing; only insertion and
//! [`Hashgraph::round_diff`] surface errors.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::consensus::cache::PredicateCaches;
use crate::consensus::coords::{Coordinate, CoordinateVector};
use crate::consensus::event::{Event, EventId, Root, WireEvent, WireInfo};
use crate::consensus::peers::Participants;
use crate::consensus::round::ParentRoundInfo;
use crate::store::{Store, StoreError};
use crate::Hash;

/// Errors surfaced by insertion and by round arithmetic.
#[derive(Debug, Error)]
pub enum HashgraphError {
    #[error("event signature is invalid")]
    InvalidSignature,
    #[error("self-parent is not the creator's last known event")]
    SelfParentMismatch,
    #[error("other-parent neither stored nor accounted for by the creator's root")]
    OtherParentUnknown,
    #[error("event creator is not a registered participant")]
    UnknownCreator,
    #[error("round not resolved for event {0}")]
    NegativeRound(EventId),
    #[error("cannot resolve wire parent (participant {participant_id}, index {index})")]
    UnresolvedWireParent { participant_id: i64, index: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handle into which the downstream ordering pass emits committed batches.
pub type CommitSink = mpsc::UnboundedSender<Vec<Event>>;

/// The consensus core.
///
/// Owns the store, the participant registry and the memoization layer.
/// Insertion mutates (`&mut self`); every query is `&self`.
pub struct Hashgraph<S: Store> {
    participants: Arc<Participants>,
    store: S,
    commit_tx: CommitSink,
    caches: PredicateCaches,
    /// Next topological index to assign
    topological_index: i64,
    /// Events inserted but not yet carried through the ordering pass
    undetermined_events: Vec<EventId>,
    /// Inserted events carrying transactions, not yet committed
    pending_loaded_events: u64,
    // Maintained for the ordering pass; the core only declares them.
    last_consensus_round: Option<i64>,
    last_committed_round_events: usize,
    consensus_transactions: u64,
}

impl<S: Store> Hashgraph<S> {
    pub fn new(participants: Arc<Participants>, store: S, commit_tx: CommitSink) -> Self {
        let caches = PredicateCaches::new(store.cache_size());
        Hashgraph {
            participants,
            store,
            commit_tx,
            caches,
            topological_index: 0,
            undetermined_events: Vec::new(),
            pending_loaded_events: 0,
            last_consensus_round: None,
            last_committed_round_events: 0,
            consensus_transactions: 0,
        }
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Event ids inserted but not yet ordered, in insertion order.
    pub fn undetermined_events(&self) -> &[EventId] {
        &self.undetermined_events
    }

    pub fn pending_loaded_events(&self) -> u64 {
        self.pending_loaded_events
    }

    pub fn last_consensus_round(&self) -> Option<i64> {
        self.last_consensus_round
    }

    pub fn last_committed_round_events(&self) -> usize {
        self.last_committed_round_events
    }

    pub fn consensus_transactions(&self) -> u64 {
        self.consensus_transactions
    }

    /// The channel the ordering pass will commit batches into.
    pub fn commit_sink(&self) -> &CommitSink {
        &self.commit_tx
    }

    /// Fetch an event, degrading store errors to absence.
    fn event(&self, id: &EventId) -> Option<Event> {
        match self.store.get_event(id) {
            Ok(event) => event,
            Err(e) => {
                warn!(event = %id, error = %e, "event lookup failed");
                None
            }
        }
    }

    fn root_of(&self, creator: &Hash) -> Option<Root> {
        match self.store.get_root(creator) {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "root lookup failed");
                None
            }
        }
    }

    // ── Predicate engine ────────────────────────────────────────────────

    /// True iff `y` lies on a directed path of parent edges from `x`.
    ///
    /// Answered from `x`'s last-ancestors: slot c records the greatest
    /// index of any event by `y`'s creator reachable from `x`, so `y` is
    /// reachable exactly when its index falls inside that frontier.
    pub fn ancestor(&self, x: &EventId, y: &EventId) -> bool {
        if x == y {
            return true;
        }
        if let Some(hit) = self.caches.ancestor.get(&(*x, *y)) {
            return hit;
        }
        let (Some(ex), Some(ey)) = (self.event(x), self.event(y)) else {
            return false;
        };
        let Some(creator_id) = self.participants.id_of(&ey.body.creator) else {
            return false;
        };
        let result = ex
            .last_ancestors
            .get(creator_id)
            .map(|last| last.index >= ey.body.index)
            .unwrap_or(false);
        self.caches.ancestor.put((*x, *y), result);
        result
    }

    /// True iff `y` is reachable from `x` along self-parent edges only.
    pub fn self_ancestor(&self, x: &EventId, y: &EventId) -> bool {
        if x == y {
            return true;
        }
        if let Some(hit) = self.caches.self_ancestor.get(&(*x, *y)) {
            return hit;
        }
        let (Some(ex), Some(ey)) = (self.event(x), self.event(y)) else {
            return false;
        };
        let result = ex.body.creator == ey.body.creator && ex.body.index >= ey.body.index;
        self.caches.self_ancestor.put((*x, *y), result);
        result
    }

    /// Equal to [`Hashgraph::ancestor`]: insertion guarantees no two
    /// events of a creator share an index, so fork checks are not needed
    /// at this layer.
    pub fn see(&self, x: &EventId, y: &EventId) -> bool {
        self.ancestor(x, y)
    }

    /// The oldest event z with `self_ancestor(x, z) && see(z, y)`.
    ///
    /// `y`'s first-descendant slot for `x`'s creator is the earliest event
    /// by that creator descending from `y`; it self-ancestor-dominates all
    /// later ones, so the answer is that slot whenever it is at or below
    /// `x`'s index.
    pub fn oldest_self_ancestor_to_see(&self, x: &EventId, y: &EventId) -> Option<EventId> {
        if let Some(hit) = self.caches.oldest_self_ancestor.get(&(*x, *y)) {
            return hit;
        }
        let (Some(ex), Some(ey)) = (self.event(x), self.event(y)) else {
            return None;
        };
        let Some(creator_id) = self.participants.id_of(&ex.body.creator) else {
            return None;
        };
        let result = ey
            .first_descendants
            .get(creator_id)
            .filter(|first| first.index <= ex.body.index)
            .map(|first| first.id);
        self.caches.oldest_self_ancestor.put((*x, *y), result);
        result
    }

    /// True iff paths from `x` back to `y` pass through events of at least
    /// a supermajority of participants: slot i contributes when `x`'s
    /// last-ancestor from participant i is at or past `y`'s
    /// first-descendant from i.
    pub fn strongly_see(&self, x: &EventId, y: &EventId) -> bool {
        if let Some(hit) = self.caches.strongly_see.get(&(*x, *y)) {
            return hit;
        }
        let (Some(ex), Some(ey)) = (self.event(x), self.event(y)) else {
            return false;
        };
        let through = ex
            .last_ancestors
            .iter()
            .zip(ey.first_descendants.iter())
            .filter(|(last, first)| last.index >= first.index)
            .count();
        let result = through >= self.participants.super_majority();
        self.caches.strongly_see.put((*x, *y), result);
        result
    }

    // ── Round engine ────────────────────────────────────────────────────

    /// The round reached by `x`'s parents, with the root flag.
    ///
    /// The other-parent side may fall back to the creator's root: directly
    /// (`other_parent == root.y`) or through `root.others`. The `others`
    /// fallback uses the root round as an upper bound; only the max of the
    /// two sides is consumed, so the bound is safe.
    pub fn parent_round(&self, x: &EventId) -> ParentRoundInfo {
        if let Some(hit) = self.caches.parent_round.get(x) {
            return hit;
        }
        let Some(ex) = self.event(x) else {
            return ParentRoundInfo::unresolved();
        };
        let Some(root) = self.root_of(&ex.creator_fingerprint()) else {
            return ParentRoundInfo::unresolved();
        };

        let mut info = if ex.body.self_parent == root.x {
            ParentRoundInfo {
                round: root.round,
                is_root: true,
            }
        } else {
            ParentRoundInfo {
                round: self.round(&ex.body.self_parent),
                is_root: false,
            }
        };

        if let Some(other_parent) = ex.body.other_parent {
            let other_side = if self.event(&other_parent).is_some() {
                Some(ParentRoundInfo {
                    round: self.round(&other_parent),
                    is_root: false,
                })
            } else if other_parent == root.y {
                Some(ParentRoundInfo {
                    round: root.round,
                    is_root: true,
                })
            } else if root.others.get(x) == Some(&other_parent) {
                Some(ParentRoundInfo {
                    round: root.round,
                    is_root: false,
                })
            } else {
                None
            };
            // Ties keep the self-parent side.
            if let Some(other_side) = other_side {
                if other_side.round > info.round {
                    info = other_side;
                }
            }
        }

        self.caches.parent_round.put(*x, info);
        info
    }

    /// True iff `x`'s round must exceed its parent round: its parents sit
    /// on the root, or it strongly-sees a supermajority of the parent
    /// round's witnesses.
    pub fn round_inc(&self, x: &EventId) -> bool {
        let parent_round = self.parent_round(x);
        if parent_round.is_root {
            return true;
        }
        if parent_round.round < 0 {
            return false;
        }
        let witnesses = match self.store.round_witnesses(parent_round.round) {
            Ok(witnesses) => witnesses,
            Err(e) => {
                warn!(round = parent_round.round, error = %e, "witness lookup failed");
                return false;
            }
        };
        let seen = witnesses
            .iter()
            .filter(|witness| self.strongly_see(x, witness))
            .count();
        seen >= self.participants.super_majority()
    }

    /// Round number of `x`; -1 when `x` cannot be resolved.
    pub fn round(&self, x: &EventId) -> i64 {
        if let Some(hit) = self.caches.round.get(x) {
            return hit;
        }
        if self.event(x).is_none() {
            return -1;
        }
        let round = self.parent_round(x).round + i64::from(self.round_inc(x));
        self.caches.round.put(*x, round);
        round
    }

    /// True iff `x` is the first event of its round for its creator.
    pub fn witness(&self, x: &EventId) -> bool {
        let Some(ex) = self.event(x) else {
            return false;
        };
        let Some(root) = self.root_of(&ex.creator_fingerprint()) else {
            return false;
        };
        if ex.body.self_parent == root.x && ex.body.other_parent == Some(root.y) {
            return true;
        }
        self.round(x) > self.round(&ex.body.self_parent)
    }

    /// Round in which `x` was finalized; -1 until the ordering pass sets it.
    pub fn round_received(&self, x: &EventId) -> i64 {
        self.event(x)
            .and_then(|event| event.round_received)
            .unwrap_or(-1)
    }

    /// `round(x) - round(y)`. Unlike the other queries this fails on
    /// unresolved rounds, because callers use the difference for protocol
    /// arithmetic where a silent -1 would corrupt results.
    pub fn round_diff(&self, x: &EventId, y: &EventId) -> Result<i64, HashgraphError> {
        let round_x = self.round(x);
        if round_x < 0 {
            return Err(HashgraphError::NegativeRound(*x));
        }
        let round_y = self.round(y);
        if round_y < 0 {
            return Err(HashgraphError::NegativeRound(*y));
        }
        Ok(round_x - round_y)
    }

    // ── Insertion pipeline ──────────────────────────────────────────────

    /// Validate and insert an event.
    ///
    /// Order: signature, self-parent, other-parent, topological index,
    /// optional wire info, coordinate initialization, store write,
    /// first-descendant back-propagation, bookkeeping. Validation failures
    /// reject the event with nothing mutated (no topological index is
    /// consumed).
    pub fn insert_event(
        &mut self,
        mut event: Event,
        set_wire_info: bool,
    ) -> Result<(), HashgraphError> {
        if !event.verify() {
            return Err(HashgraphError::InvalidSignature);
        }
        let id = event.id;
        let fingerprint = event.creator_fingerprint();
        trace!(event = %id, index = event.body.index, "validating event");

        self.check_self_parent(&event, &fingerprint)?;
        self.check_other_parent(&event, &fingerprint)?;

        event.topological_index = self.topological_index;

        if set_wire_info {
            self.set_wire_info(&mut event, &fingerprint)?;
        }

        self.init_event_coordinates(&mut event)?;
        self.store.set_event(&event)?;
        // The write succeeded; the index is consumed from here on.
        self.topological_index += 1;

        self.update_ancestor_first_descendants(&event)?;

        self.undetermined_events.push(id);
        if event.is_loaded() {
            self.pending_loaded_events += 1;
        }
        debug!(event = %id, topological_index = event.topological_index, "inserted event");
        Ok(())
    }

    /// The self-parent must be the creator's last known event. This is the
    /// check that keeps per-creator indices unique and contiguous.
    fn check_self_parent(&self, event: &Event, creator: &Hash) -> Result<(), HashgraphError> {
        let (last, is_root) = self.store.last_from(creator)?;
        trace!(event = %event.id, last = %last, is_root, "self-parent check");
        if event.body.self_parent != last {
            return Err(HashgraphError::SelfParentMismatch);
        }
        Ok(())
    }

    /// An unknown other-parent is admissible only when the creator's root
    /// accounts for it: the event sits directly on the root, or the root's
    /// `others` map records the reference.
    fn check_other_parent(&self, event: &Event, creator: &Hash) -> Result<(), HashgraphError> {
        let Some(other_parent) = event.body.other_parent else {
            return Ok(());
        };
        if self.store.get_event(&other_parent)?.is_some() {
            return Ok(());
        }
        let root = self
            .store
            .get_root(creator)?
            .ok_or(HashgraphError::UnknownCreator)?;
        if root.x == event.body.self_parent && root.y == other_parent {
            return Ok(());
        }
        if root.others.get(&event.id) == Some(&other_parent) {
            return Ok(());
        }
        Err(HashgraphError::OtherParentUnknown)
    }

    fn set_wire_info(&self, event: &mut Event, creator: &Hash) -> Result<(), HashgraphError> {
        let creator_id = self
            .participants
            .id_of(&event.body.creator)
            .ok_or(HashgraphError::UnknownCreator)? as i64;

        let self_parent_index = match self.store.get_event(&event.body.self_parent)? {
            Some(self_parent) => self_parent.body.index,
            None => self
                .store
                .get_root(creator)?
                .map(|root| root.index)
                .unwrap_or(-1),
        };

        let (other_parent_creator_id, other_parent_index) = match &event.body.other_parent {
            Some(other_parent) => match self.store.get_event(other_parent)? {
                Some(other) => (
                    self.participants
                        .id_of(&other.body.creator)
                        .ok_or(HashgraphError::UnknownCreator)? as i64,
                    other.body.index,
                ),
                // Root-accounted other-parent: not representable by indices.
                None => (-1, -1),
            },
            None => (-1, -1),
        };

        event.wire_info = Some(WireInfo {
            self_parent_index,
            other_parent_creator_id,
            other_parent_index,
            creator_id,
        });
        Ok(())
    }

    /// Seed the coordinate vectors from the resolvable parents and stamp
    /// the creator's own slot in both.
    fn init_event_coordinates(&self, event: &mut Event) -> Result<(), HashgraphError> {
        let n = self.participants.len();
        event.first_descendants = CoordinateVector::unset_descendants(n);

        let self_parent = self.store.get_event(&event.body.self_parent)?;
        let other_parent = match &event.body.other_parent {
            Some(other_parent) => self.store.get_event(other_parent)?,
            None => None,
        };

        event.last_ancestors = match (self_parent, other_parent) {
            (None, None) => CoordinateVector::unknown_ancestors(n),
            (Some(parent), None) | (None, Some(parent)) => parent.last_ancestors.clone(),
            (Some(self_parent), Some(other_parent)) => {
                let mut merged = self_parent.last_ancestors.clone();
                merged.merge_max(&other_parent.last_ancestors);
                merged
            }
        };

        let creator_id = self
            .participants
            .id_of(&event.body.creator)
            .ok_or(HashgraphError::UnknownCreator)?;
        let own = Coordinate {
            index: event.body.index,
            id: event.id,
        };
        event.last_ancestors.set(creator_id, own);
        event.first_descendants.set(creator_id, own);
        Ok(())
    }

    /// The inserted event is the earliest known descendant, from its
    /// creator, of every ancestor whose slot is still unset. Walk each
    /// last-ancestor chain backwards over self-parent edges, filling slots
    /// until one is already set: ancestors further back were covered when
    /// that one was.
    fn update_ancestor_first_descendants(&self, event: &Event) -> Result<(), HashgraphError> {
        let creator_id = self
            .participants
            .id_of(&event.body.creator)
            .ok_or(HashgraphError::UnknownCreator)?;
        let own = Coordinate {
            index: event.body.index,
            id: event.id,
        };

        for slot in event.last_ancestors.iter() {
            if slot.index < 0 {
                continue;
            }
            let mut cursor = slot.id;
            loop {
                let Some(mut ancestor) = self.store.get_event(&cursor)? else {
                    break; // root boundary
                };
                let unset = ancestor
                    .first_descendants
                    .get(creator_id)
                    .map(|first| !first.is_set())
                    .unwrap_or(false);
                if !unset {
                    break;
                }
                ancestor.first_descendants.set(creator_id, own);
                self.store.set_event(&ancestor)?;
                cursor = ancestor.body.self_parent;
            }
        }
        Ok(())
    }

    /// Reconstruct an [`Event`] from its wire form by resolving the
    /// (creator id, index) parent coordinates through the store. Performs
    /// no validation; the result goes through [`Hashgraph::insert_event`].
    pub fn read_wire_info(&self, wire: &WireEvent) -> Result<Event, HashgraphError> {
        let body = &wire.body;
        let creator = self
            .participants
            .key_of(usize::try_from(body.creator_id).map_err(|_| HashgraphError::UnknownCreator)?)
            .ok_or(HashgraphError::UnknownCreator)?
            .clone();
        let fingerprint = creator.fingerprint();
        let root = self
            .store
            .get_root(&fingerprint)?
            .ok_or(HashgraphError::UnknownCreator)?;

        let self_parent = if body.self_parent_index >= 0 {
            self.store
                .participant_event(&fingerprint, body.self_parent_index)?
                .ok_or(HashgraphError::UnresolvedWireParent {
                    participant_id: body.creator_id,
                    index: body.self_parent_index,
                })?
        } else {
            root.x
        };

        let other_parent = if body.other_parent_index >= 0 {
            let other_creator = self
                .participants
                .key_of(
                    usize::try_from(body.other_parent_creator_id)
                        .map_err(|_| HashgraphError::UnknownCreator)?,
                )
                .ok_or(HashgraphError::UnknownCreator)?;
            Some(
                self.store
                    .participant_event(&other_creator.fingerprint(), body.other_parent_index)?
                    .ok_or(HashgraphError::UnresolvedWireParent {
                        participant_id: body.other_parent_creator_id,
                        index: body.other_parent_index,
                    })?,
            )
        } else {
            None
        };

        let mut event = Event::from_parts(
            crate::consensus::event::EventBody {
                transactions: body.transactions.clone(),
                self_parent,
                other_parent,
                creator,
                timestamp: body.timestamp,
                index: body.index,
            },
            wire.signature.clone(),
        );
        event.wire_info = Some(WireInfo {
            self_parent_index: body.self_parent_index,
            other_parent_creator_id: body.other_parent_creator_id,
            other_parent_index: body.other_parent_index,
            creator_id: body.creator_id,
        });
        Ok(event)
    }
}
