//! Dilithium5 signing for event creators.
//!
//! Every participant is an ML-DSA-87 (Dilithium5) identity. Creators sign
//! the 32-byte event id, and the graph admits an event only when that
//! signature checks out against the creator key embedded in the body. Key
//! and signature bytes are length-checked at every boundary — construction
//! and deserialization — so malformed material never reaches the signing
//! primitives.

use pqcrypto_dilithium::dilithium5;
use pqcrypto_traits::sign::{
    DetachedSignature as SigTrait, PublicKey as SignPkTrait, SecretKey as SignSkTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Hash;

/// Dilithium5 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 2592;
/// Dilithium5 detached signature length in bytes.
pub const SIGNATURE_LEN: usize = 4627;

/// Key or signature material that failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("malformed Dilithium5 public key")]
    MalformedPublicKey,
    #[error("malformed Dilithium5 secret key")]
    MalformedSecretKey,
    #[error("malformed Dilithium5 signature")]
    MalformedSignature,
}

/// A signing keypair held by a participant.
///
/// `Clone` so the same identity can serve event creation and test
/// fixtures; the secret half zeroizes itself on drop.
#[derive(Clone)]
pub struct SigningKeypair {
    pub public: SigningPublicKey,
    pub secret: SigningSecretKey,
}

impl SigningKeypair {
    /// Generate a fresh keypair from the system RNG.
    pub fn generate() -> Self {
        let (public, secret) = dilithium5::keypair();
        SigningKeypair {
            public: SigningPublicKey(public.as_bytes().to_vec()),
            secret: SigningSecretKey(secret.as_bytes().to_vec()),
        }
    }

    /// Rebuild a keypair from stored bytes, rejecting anything the
    /// Dilithium5 backend does not accept.
    pub fn from_bytes(public: Vec<u8>, secret: Vec<u8>) -> Result<Self, KeyError> {
        dilithium5::PublicKey::from_bytes(&public).map_err(|_| KeyError::MalformedPublicKey)?;
        dilithium5::SecretKey::from_bytes(&secret).map_err(|_| KeyError::MalformedSecretKey)?;
        Ok(SigningKeypair {
            public: SigningPublicKey(public),
            secret: SigningSecretKey(secret),
        })
    }

    /// Produce a detached signature over `message`.
    ///
    /// Fails only when the held secret bytes have been corrupted, which
    /// callers should treat as fatal for this identity.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, KeyError> {
        let secret = dilithium5::SecretKey::from_bytes(&self.secret.0)
            .map_err(|_| KeyError::MalformedSecretKey)?;
        let detached = dilithium5::detached_sign(message, &secret);
        Ok(Signature(detached.as_bytes().to_vec()))
    }
}

/// The secret half of a keypair. Raw bytes stay crate-private and are
/// wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecretKey(pub(crate) Vec<u8>);

/// A participant's signing public key.
///
/// The inner vector is crate-private, so every key in circulation went
/// through the length check in `TryFrom` (which serde also routes
/// through) or came out of the backend itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct SigningPublicKey(pub(crate) Vec<u8>);

impl SigningPublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// 32-byte BLAKE3 digest of the key. The store and the participant
    /// registry use this as the participant id.
    pub fn fingerprint(&self) -> Hash {
        crate::hash_domain(b"weft.signing.fingerprint", &self.0)
    }

    /// Check a detached signature over `message`.
    ///
    /// Verification is a predicate, not a fallible operation: malformed
    /// keys or signatures simply fail the check.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = dilithium5::PublicKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(detached) = dilithium5::DetachedSignature::from_bytes(&signature.0) else {
            return false;
        };
        dilithium5::verify_detached_signature(&detached, message, &key).is_ok()
    }
}

impl TryFrom<Vec<u8>> for SigningPublicKey {
    type Error = KeyError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(KeyError::MalformedPublicKey);
        }
        Ok(SigningPublicKey(bytes))
    }
}

impl From<SigningPublicKey> for Vec<u8> {
    fn from(key: SigningPublicKey) -> Vec<u8> {
        key.0
    }
}

/// A detached Dilithium5 signature.
///
/// Zero length marks a record that was never signed; such a signature
/// fails every verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Signature(pub(crate) Vec<u8>);

impl Signature {
    /// The unsigned placeholder.
    pub fn empty() -> Self {
        Signature(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for Signature {
    type Error = KeyError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, KeyError> {
        // Either the unsigned placeholder or a full signature; odd sizes
        // are rejected up front to bound what deserialization will accept.
        if bytes.is_empty() || bytes.len() == SIGNATURE_LEN {
            Ok(Signature(bytes))
        } else {
            Err(KeyError::MalformedSignature)
        }
    }
}

impl From<Signature> for Vec<u8> {
    fn from(signature: Signature) -> Vec<u8> {
        signature.0
    }
}
