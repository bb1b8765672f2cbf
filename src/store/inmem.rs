//! In-memory store: RwLock'd maps, suitable for tests and light nodes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::consensus::event::{Event, EventId, Root};
use crate::consensus::peers::Participants;
use crate::consensus::round::RoundInfo;
use crate::store::{Store, StoreError};
use crate::Hash;

struct Inner {
    events: HashMap<EventId, Event>,
    /// Per-participant `index -> id`, ordered so the last entry is the
    /// latest event
    participant_events: HashMap<Hash, BTreeMap<i64, EventId>>,
    roots: HashMap<Hash, Root>,
    rounds: BTreeMap<i64, RoundInfo>,
    consensus_events: Vec<EventId>,
}

/// In-memory [`Store`] seeded with one base root per participant.
pub struct InmemStore {
    participants: Arc<Participants>,
    cache_size: usize,
    inner: RwLock<Inner>,
}

impl InmemStore {
    pub fn new(participants: Arc<Participants>, cache_size: usize) -> Self {
        let mut roots = HashMap::with_capacity(participants.len());
        let mut participant_events = HashMap::with_capacity(participants.len());
        for (_, key) in participants.iter() {
            roots.insert(key.fingerprint(), Root::base(key));
            participant_events.insert(key.fingerprint(), BTreeMap::new());
        }
        InmemStore {
            participants,
            cache_size,
            inner: RwLock::new(Inner {
                events: HashMap::new(),
                participant_events,
                roots,
                rounds: BTreeMap::new(),
                consensus_events: Vec::new(),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("store lock poisoned")
    }
}

impl Store for InmemStore {
    fn cache_size(&self) -> usize {
        self.cache_size
    }

    fn get_event(&self, id: &EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.read().events.get(id).cloned())
    }

    fn set_event(&self, event: &Event) -> Result<(), StoreError> {
        let fingerprint = event.creator_fingerprint();
        let mut inner = self.write();
        inner
            .participant_events
            .get_mut(&fingerprint)
            .ok_or(StoreError::UnknownParticipant)?
            .insert(event.body.index, event.id);
        inner.events.insert(event.id, event.clone());
        Ok(())
    }

    fn get_root(&self, creator: &Hash) -> Result<Option<Root>, StoreError> {
        Ok(self.read().roots.get(creator).cloned())
    }

    fn last_from(&self, creator: &Hash) -> Result<(EventId, bool), StoreError> {
        let inner = self.read();
        let root = inner
            .roots
            .get(creator)
            .ok_or(StoreError::UnknownParticipant)?;
        match inner
            .participant_events
            .get(creator)
            .and_then(|by_index| by_index.last_key_value())
        {
            Some((_, id)) => Ok((*id, false)),
            None => Ok((root.x, true)),
        }
    }

    fn participant_event(
        &self,
        creator: &Hash,
        index: i64,
    ) -> Result<Option<EventId>, StoreError> {
        Ok(self
            .read()
            .participant_events
            .get(creator)
            .and_then(|by_index| by_index.get(&index))
            .copied())
    }

    fn get_round(&self, round: i64) -> Result<Option<RoundInfo>, StoreError> {
        Ok(self.read().rounds.get(&round).cloned())
    }

    fn set_round(&self, round: i64, info: &RoundInfo) -> Result<(), StoreError> {
        self.write().rounds.insert(round, info.clone());
        Ok(())
    }

    fn last_round(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.read().rounds.last_key_value().map(|(r, _)| *r))
    }

    fn known(&self) -> Result<HashMap<usize, i64>, StoreError> {
        let inner = self.read();
        let mut known = HashMap::with_capacity(self.participants.len());
        for (id, key) in self.participants.iter() {
            let last = inner
                .participant_events
                .get(&key.fingerprint())
                .and_then(|by_index| by_index.last_key_value())
                .map(|(index, _)| *index)
                .unwrap_or(-1);
            known.insert(id, last);
        }
        Ok(known)
    }

    fn consensus_events(&self) -> Result<Vec<EventId>, StoreError> {
        Ok(self.read().consensus_events.clone())
    }

    fn add_consensus_event(&self, id: &EventId) -> Result<(), StoreError> {
        self.write().consensus_events.push(*id);
        Ok(())
    }

    fn reset(&self, roots: HashMap<Hash, Root>) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner.events.clear();
        inner.rounds.clear();
        inner.consensus_events.clear();
        inner.participant_events = roots.keys().map(|fp| (*fp, BTreeMap::new())).collect();
        inner.roots = roots;
        Ok(())
    }
}
