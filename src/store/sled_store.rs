//! Sled-backed persistent store.
//!
//! Trees: `events` (id -> event), `participant_events` (fingerprint ||
//! big-endian index -> id, so prefix scans yield index order), `roots`
//! (fingerprint -> root), `rounds` (big-endian round -> record) and
//! `consensus` (big-endian sequence -> id).

use std::collections::HashMap;
use std::sync::Arc;

use crate::consensus::event::{Event, EventId, Root};
use crate::consensus::peers::Participants;
use crate::consensus::round::RoundInfo;
use crate::store::{Store, StoreError};
use crate::Hash;

pub struct SledStore {
    #[allow(dead_code)]
    db: sled::Db,
    events: sled::Tree,
    participant_events: sled::Tree,
    roots: sled::Tree,
    rounds: sled::Tree,
    consensus: sled::Tree,
    participants: Arc<Participants>,
    cache_size: usize,
}

fn io_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(e.to_string())
}

fn ser_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(e.to_string())
}

fn participant_event_key(creator: &Hash, index: i64) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..32].copy_from_slice(creator);
    key[32..].copy_from_slice(&(index as u64).to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Result<EventId, StoreError> {
    let hash: Hash = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("invalid event id length".into()))?;
    Ok(EventId(hash))
}

impl SledStore {
    /// Open or create a sled database at the given path and seed missing
    /// base roots.
    pub fn open(
        path: &std::path::Path,
        participants: Arc<Participants>,
        cache_size: usize,
    ) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(io_err)?;
        Self::from_db(db, participants, cache_size)
    }

    /// Open a temporary sled database (for testing).
    pub fn open_temporary(
        participants: Arc<Participants>,
        cache_size: usize,
    ) -> Result<Self, StoreError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open().map_err(io_err)?;
        Self::from_db(db, participants, cache_size)
    }

    fn from_db(
        db: sled::Db,
        participants: Arc<Participants>,
        cache_size: usize,
    ) -> Result<Self, StoreError> {
        let events = db.open_tree("events").map_err(io_err)?;
        let participant_events = db.open_tree("participant_events").map_err(io_err)?;
        let roots = db.open_tree("roots").map_err(io_err)?;
        let rounds = db.open_tree("rounds").map_err(io_err)?;
        let consensus = db.open_tree("consensus").map_err(io_err)?;

        for (_, key) in participants.iter() {
            let fingerprint = key.fingerprint();
            if !roots.contains_key(fingerprint).map_err(io_err)? {
                let value = bincode::serialize(&Root::base(key)).map_err(ser_err)?;
                roots.insert(fingerprint, value).map_err(io_err)?;
            }
        }

        Ok(SledStore {
            db,
            events,
            participant_events,
            roots,
            rounds,
            consensus,
            participants,
            cache_size,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(io_err)?;
        Ok(())
    }

    fn last_participant_entry(
        &self,
        creator: &Hash,
    ) -> Result<Option<(i64, EventId)>, StoreError> {
        match self.participant_events.scan_prefix(creator).last() {
            Some(entry) => {
                let (key, value) = entry.map_err(io_err)?;
                let index_bytes: [u8; 8] = key[32..]
                    .try_into()
                    .map_err(|_| StoreError::Serialization("invalid index key".into()))?;
                Ok(Some((
                    u64::from_be_bytes(index_bytes) as i64,
                    decode_id(&value)?,
                )))
            }
            None => Ok(None),
        }
    }
}

impl Store for SledStore {
    fn cache_size(&self) -> usize {
        self.cache_size
    }

    fn get_event(&self, id: &EventId) -> Result<Option<Event>, StoreError> {
        match self.events.get(id.0).map_err(io_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn set_event(&self, event: &Event) -> Result<(), StoreError> {
        let fingerprint = event.creator_fingerprint();
        if !self.roots.contains_key(fingerprint).map_err(io_err)? {
            return Err(StoreError::UnknownParticipant);
        }
        let value = bincode::serialize(event).map_err(ser_err)?;
        self.events.insert(event.id.0, value).map_err(io_err)?;
        self.participant_events
            .insert(
                participant_event_key(&fingerprint, event.body.index),
                event.id.0.to_vec(),
            )
            .map_err(io_err)?;
        Ok(())
    }

    fn get_root(&self, creator: &Hash) -> Result<Option<Root>, StoreError> {
        match self.roots.get(creator).map_err(io_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn last_from(&self, creator: &Hash) -> Result<(EventId, bool), StoreError> {
        let root = self
            .get_root(creator)?
            .ok_or(StoreError::UnknownParticipant)?;
        match self.last_participant_entry(creator)? {
            Some((_, id)) => Ok((id, false)),
            None => Ok((root.x, true)),
        }
    }

    fn participant_event(
        &self,
        creator: &Hash,
        index: i64,
    ) -> Result<Option<EventId>, StoreError> {
        if index < 0 {
            return Ok(None);
        }
        match self
            .participant_events
            .get(participant_event_key(creator, index))
            .map_err(io_err)?
        {
            Some(bytes) => Ok(Some(decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_round(&self, round: i64) -> Result<Option<RoundInfo>, StoreError> {
        if round < 0 {
            return Ok(None);
        }
        match self.rounds.get((round as u64).to_be_bytes()).map_err(io_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn set_round(&self, round: i64, info: &RoundInfo) -> Result<(), StoreError> {
        let value = bincode::serialize(info).map_err(ser_err)?;
        self.rounds
            .insert((round as u64).to_be_bytes(), value)
            .map_err(io_err)?;
        Ok(())
    }

    fn last_round(&self) -> Result<Option<i64>, StoreError> {
        match self.rounds.last().map_err(io_err)? {
            Some((key, _)) => {
                let round_bytes: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Serialization("invalid round key".into()))?;
                Ok(Some(u64::from_be_bytes(round_bytes) as i64))
            }
            None => Ok(None),
        }
    }

    fn known(&self) -> Result<HashMap<usize, i64>, StoreError> {
        let mut known = HashMap::with_capacity(self.participants.len());
        for (id, key) in self.participants.iter() {
            let last = self
                .last_participant_entry(&key.fingerprint())?
                .map(|(index, _)| index)
                .unwrap_or(-1);
            known.insert(id, last);
        }
        Ok(known)
    }

    fn consensus_events(&self) -> Result<Vec<EventId>, StoreError> {
        let mut events = Vec::new();
        for entry in self.consensus.iter() {
            let (_, value) = entry.map_err(io_err)?;
            events.push(decode_id(&value)?);
        }
        Ok(events)
    }

    fn add_consensus_event(&self, id: &EventId) -> Result<(), StoreError> {
        let seq = self.consensus.len() as u64;
        self.consensus
            .insert(seq.to_be_bytes(), id.0.to_vec())
            .map_err(io_err)?;
        Ok(())
    }

    fn reset(&self, roots: HashMap<Hash, Root>) -> Result<(), StoreError> {
        self.events.clear().map_err(io_err)?;
        self.participant_events.clear().map_err(io_err)?;
        self.rounds.clear().map_err(io_err)?;
        self.consensus.clear().map_err(io_err)?;
        self.roots.clear().map_err(io_err)?;
        for (fingerprint, root) in &roots {
            let value = bincode::serialize(root).map_err(ser_err)?;
            self.roots.insert(fingerprint, value).map_err(io_err)?;
        }
        Ok(())
    }
}
