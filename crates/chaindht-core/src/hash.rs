//! SHA-256 hashing and the length-first byte comparison used throughout
//! the protocol for hash and target ordering.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

use crate::constants::HASH_SIZE;

/// A 32-byte SHA-256 digest.
///
/// Ordering follows [`compare_bytes`]: since every `Hash32` is exactly
/// [`HASH_SIZE`] bytes, this reduces to plain byte-lexicographic order, but
/// the comparator is shared with [`Target`](crate::types::Target) so the
/// "longer slice is greater" rule in the original protocol is preserved in
/// one place.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Hash32(pub [u8; HASH_SIZE]);

impl Hash32 {
    pub const ZERO: Self = Self([0u8; HASH_SIZE]);

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_SIZE]> for Hash32 {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl PartialOrd for Hash32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash32 {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_bytes(&self.0, &other.0)
    }
}

/// Compare two byte slices the way the original protocol does: a longer
/// slice is always greater, regardless of content; equal-length slices
/// compare byte by byte. Targets must be left-padded to
/// [`HASH_SIZE`](crate::constants::HASH_SIZE) bytes before being compared
/// with this function so that a shorter (post-retarget) target is never
/// mistakenly judged "easier" just because it has fewer bytes.
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

/// SHA-256 of an arbitrary byte buffer.
pub fn sha256(data: &[u8]) -> Hash32 {
    let digest = Sha256::digest(data);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest);
    Hash32(out)
}

/// A random 32-byte value, used as a DHT key filler (e.g. for bootstrap pings).
/// Not used for consensus-relevant hashing.
pub fn random_hash() -> Hash32 {
    let mut bytes = [0u8; HASH_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    Hash32(bytes)
}

/// Left-pad `bytes` with zeros until it is exactly [`HASH_SIZE`] bytes long.
///
/// Used after difficulty retargeting: dividing a 32-byte big-endian integer
/// can shrink its big-endian byte representation, and a shrunk target must
/// not compare as "greater" purely because it has fewer bytes.
pub fn left_pad_32(bytes: &[u8]) -> [u8; HASH_SIZE] {
    let mut out = [0u8; HASH_SIZE];
    let start = HASH_SIZE.saturating_sub(bytes.len());
    let take = bytes.len().min(HASH_SIZE);
    out[start..].copy_from_slice(&bytes[bytes.len() - take..]);
    out
}
