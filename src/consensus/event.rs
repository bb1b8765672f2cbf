//! Events: the vertices of the hashgraph.
//!
//! An event is a signed record of one gossip exchange. Its identity is a
//! domain-separated BLAKE3 hash of the body; the creator signs that hash.
//! The core stamps each inserted event with a topological index and two
//! participant-indexed coordinate vectors, and may later fill in the
//! first-descendant slots of its ancestors (back-propagation), so stored
//! events are re-written through the store rather than held immutable.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consensus::coords::CoordinateVector;
use crate::crypto::keys::{KeyError, Signature, SigningKeypair, SigningPublicKey};
use crate::Hash;

/// Unique identifier for an event (hash of the body fields).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub crate::Hash);

impl EventId {
    /// The all-zero id. Used as the placeholder inside unset coordinates.
    pub fn zero() -> Self {
        EventId([0u8; 32])
    }

    /// Full lowercase hex form of the id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The signed portion of an event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventBody {
    /// Opaque transaction payloads; not interpreted by the core
    pub transactions: Vec<Vec<u8>>,
    /// The creator's previous event, or the creator's root `x` for the
    /// very first event
    pub self_parent: EventId,
    /// An event heard from another participant, if any
    pub other_parent: Option<EventId>,
    /// Creator's signing public key
    pub creator: SigningPublicKey,
    /// Creator-asserted wall time (millis); advisory only
    pub timestamp: u64,
    /// Monotonic per-creator sequence number (0, 1, 2, ...)
    pub index: i64,
}

impl EventBody {
    /// Compute the event id from the body fields.
    ///
    /// Each variable-length part is length-prefixed so that distinct bodies
    /// can never produce the same byte stream.
    pub fn hash(&self) -> EventId {
        let mut hasher = blake3::Hasher::new_derive_key("weft.event.id");
        hasher.update(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            hasher.update(&(tx.len() as u64).to_le_bytes());
            hasher.update(tx);
        }
        hasher.update(&self.self_parent.0);
        match &self.other_parent {
            Some(p) => {
                hasher.update(&[1u8]);
                hasher.update(&p.0);
            }
            None => {
                hasher.update(&[0u8]);
            }
        }
        hasher.update(self.creator.as_bytes());
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&self.index.to_le_bytes());
        EventId(*hasher.finalize().as_bytes())
    }
}

/// Compact parent references for re-serialization, resolved at insert time.
///
/// `-1` marks "no such parent" (a root boundary or an absent other-parent).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireInfo {
    pub self_parent_index: i64,
    pub other_parent_creator_id: i64,
    pub other_parent_index: i64,
    pub creator_id: i64,
}

/// An event in the hashgraph.
///
/// `topological_index`, the coordinate vectors and `wire_info` are assigned
/// by the core during insertion; `round_received` is reserved for the
/// downstream ordering pass and is never written here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// Identity (hash of `body`)
    pub id: EventId,
    pub body: EventBody,
    /// Creator's signature over `id`
    pub signature: Signature,
    /// Dense insertion-order index, assigned by the core
    pub topological_index: i64,
    /// Round in which the event was finalized; set by the ordering pass
    pub round_received: Option<i64>,
    /// Per-participant latest-known-ancestor coordinates
    pub last_ancestors: CoordinateVector,
    /// Per-participant earliest-known-descendant coordinates
    pub first_descendants: CoordinateVector,
    pub wire_info: Option<WireInfo>,
}

impl Event {
    /// Build and sign an event. Fails only when the keypair's secret
    /// bytes are corrupt.
    pub fn new(body: EventBody, keypair: &SigningKeypair) -> Result<Self, KeyError> {
        let id = body.hash();
        let signature = keypair.sign(&id.0)?;
        Ok(Event {
            id,
            body,
            signature,
            topological_index: -1,
            round_received: None,
            last_ancestors: CoordinateVector::default(),
            first_descendants: CoordinateVector::default(),
            wire_info: None,
        })
    }

    /// Recompose an event from a decoded body and an existing signature
    /// (the wire path). Performs no validation.
    pub fn from_parts(body: EventBody, signature: Signature) -> Self {
        let id = body.hash();
        Event {
            id,
            body,
            signature,
            topological_index: -1,
            round_received: None,
            last_ancestors: CoordinateVector::default(),
            first_descendants: CoordinateVector::default(),
            wire_info: None,
        }
    }

    /// Verify identity and creator signature.
    pub fn verify(&self) -> bool {
        if self.body.hash() != self.id {
            return false;
        }
        self.body.creator.verify(&self.id.0, &self.signature)
    }

    /// An event is "loaded" when it carries transactions.
    pub fn is_loaded(&self) -> bool {
        !self.body.transactions.is_empty()
    }

    /// Fingerprint of the creator key; the store keys participants by it.
    pub fn creator_fingerprint(&self) -> Hash {
        self.body.creator.fingerprint()
    }

    /// Compact wire form. `None` until the insert pipeline has resolved the
    /// parent indices (`set_wire_info`).
    pub fn to_wire(&self) -> Option<WireEvent> {
        let info = self.wire_info?;
        Some(WireEvent {
            body: WireBody {
                transactions: self.body.transactions.clone(),
                timestamp: self.body.timestamp,
                index: self.body.index,
                self_parent_index: info.self_parent_index,
                other_parent_creator_id: info.other_parent_creator_id,
                other_parent_index: info.other_parent_index,
                creator_id: info.creator_id,
            },
            signature: self.signature.clone(),
        })
    }
}

/// Wire body: parents as (creator id, index) coordinates instead of hashes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBody {
    pub transactions: Vec<Vec<u8>>,
    pub timestamp: u64,
    pub index: i64,
    pub self_parent_index: i64,
    pub other_parent_creator_id: i64,
    pub other_parent_index: i64,
    pub creator_id: i64,
}

/// Compact event form exchanged between nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireEvent {
    pub body: WireBody,
    pub signature: Signature,
}

/// A validator's signature over a block.
///
/// Peripheral to the core: carried through events and handed to the
/// downstream ordering pass untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockSignature {
    pub validator: Vec<u8>,
    pub index: u64,
    pub signature: String,
}

impl BlockSignature {
    /// Wire form drops the validator key; the receiver resolves it from
    /// context.
    pub fn to_wire(&self) -> WireBlockSignature {
        WireBlockSignature {
            index: self.index,
            signature: self.signature.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBlockSignature {
    pub index: u64,
    pub signature: String,
}

/// Per-participant synthetic "pre-event" marking the frontier below which
/// the graph is unknown.
///
/// `x` stands in for a virtual self-parent and `y` for a virtual
/// other-parent of the participant's first real event. `others` records
/// other-parents referenced by events just above the root but living
/// outside the known graph, keyed by the referencing event's id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Root {
    pub x: EventId,
    pub y: EventId,
    /// One less than the participant's first real event index
    pub index: i64,
    pub round: i64,
    pub others: HashMap<EventId, EventId>,
}

impl Root {
    /// The base root of a participant whose history is known from the very
    /// beginning: index -1, round -1, synthetic parent ids derived from the
    /// participant key.
    pub fn base(creator: &SigningPublicKey) -> Self {
        Root {
            x: EventId(crate::hash_domain(b"weft.root.self", creator.as_bytes())),
            y: EventId(crate::hash_domain(b"weft.root.other", creator.as_bytes())),
            index: -1,
            round: -1,
            others: HashMap::new(),
        }
    }
}
