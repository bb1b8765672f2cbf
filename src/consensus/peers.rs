//! The fixed participant set.
//!
//! Participant keys are mapped once to dense integer ids in `[0, N)`; the
//! ids index every coordinate vector. N never changes for the lifetime of
//! a graph.

use std::collections::HashMap;

use crate::crypto::keys::SigningPublicKey;
use crate::Hash;

/// Participant registry: a bijection between signing keys (by fingerprint)
/// and dense ids.
#[derive(Clone, Debug)]
pub struct Participants {
    by_fingerprint: HashMap<Hash, usize>,
    keys: Vec<SigningPublicKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate participant key")]
    DuplicateKey,
    #[error("participant set is empty")]
    Empty,
}

impl Participants {
    /// Build the registry. Dense ids follow the order of `keys`.
    pub fn from_keys(keys: Vec<SigningPublicKey>) -> Result<Self, RegistryError> {
        if keys.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut by_fingerprint = HashMap::with_capacity(keys.len());
        for (id, key) in keys.iter().enumerate() {
            if by_fingerprint.insert(key.fingerprint(), id).is_some() {
                return Err(RegistryError::DuplicateKey);
            }
        }
        Ok(Participants {
            by_fingerprint,
            keys,
        })
    }

    /// Number of participants N.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Threshold for strongly-seeing and round increments: 2N/3 + 1.
    pub fn super_majority(&self) -> usize {
        (self.keys.len() * 2) / 3 + 1
    }

    /// Dense id of a participant key.
    pub fn id_of(&self, key: &SigningPublicKey) -> Option<usize> {
        self.id_of_fingerprint(&key.fingerprint())
    }

    /// Dense id by key fingerprint.
    pub fn id_of_fingerprint(&self, fingerprint: &Hash) -> Option<usize> {
        self.by_fingerprint.get(fingerprint).copied()
    }

    /// Key of a dense id.
    pub fn key_of(&self, id: usize) -> Option<&SigningPublicKey> {
        self.keys.get(id)
    }

    /// Iterate `(dense id, key)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SigningPublicKey)> {
        self.keys.iter().enumerate()
    }
}
