//! # Hashing Utilities
//!
//! Two hash functions, used for two distinct jobs:
//!
//! - **Keccak-256** — Everything the account model touches: transaction
//!   hashes, address derivation, signature digests, and bloom-filter
//!   indexing. The account layer is Ethereum-shaped, so it speaks the hash
//!   that ecosystem expects.
//! - **BLAKE3** — Protocol-native derivations: the serial-number PRF,
//!   value commitments, and the commitment-tree Merkle root. Faster on
//!   every platform that matters, with first-class domain separation via
//!   `derive_key`.
//!
//! ## hash_to_field
//!
//! Proof public inputs are BN254 scalars, but the chain state is bytes.
//! [`hash_to_field`] bridges the two with hash-and-reduce: BLAKE3, then
//! reduction mod the field order. Deterministic, and the bias introduced
//! by reduction is irrelevant at these security levels.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// A 32-byte hash value.
///
/// Used for transaction hashes, serial numbers, commitments, tree roots,
/// and log topics. The interpretation depends on context; the type only
/// guarantees the width.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, std::hash::Hash, Default, Serialize, Deserialize,
)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Construct from a byte slice. Returns `None` unless exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Hex-encode with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account address (the trailing 20 bytes of the Keccak-256 of
/// the uncompressed public key).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, std::hash::Hash, Default, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address.
    pub const fn zero() -> Self {
        Self([0u8; 20])
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Construct from a byte slice. Returns `None` unless exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// The Keccak-256 of the address bytes, used where a 32-byte key is
    /// needed (e.g. the serial-number PRF input).
    pub fn hash(&self) -> Hash {
        keccak256(&self.0)
    }

    /// Hex-encode with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Keccak-256
// ---------------------------------------------------------------------------

/// Compute the Keccak-256 hash of the input.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Keccak-256 over multiple byte slices without concatenation overhead.
pub fn keccak256_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

// ---------------------------------------------------------------------------
// BLAKE3
// ---------------------------------------------------------------------------

/// Domain-separated BLAKE3 over multiple byte slices.
///
/// Uses BLAKE3's `derive_key` mode: the context string selects a distinct
/// internal IV, so values derived under different domains can never
/// collide even on identical input bytes. All protocol-native derivations
/// (PRF, commitments, tree nodes) go through this.
pub fn domain_hash(context: &str, parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    Hash(*hasher.finalize().as_bytes())
}

// ---------------------------------------------------------------------------
// hash_to_field
// ---------------------------------------------------------------------------

/// Map arbitrary bytes to a BN254 scalar field element.
///
/// BLAKE3, then `from_le_bytes_mod_order` — the standard arkworks
/// hash-and-reduce construction. Used to turn commitments, serials, roots,
/// and keys into proof public inputs.
pub fn hash_to_field(data: &[u8]) -> Fr {
    let digest = blake3::hash(data);
    Fr::from_le_bytes_mod_order(digest.as_bytes())
}

// ---------------------------------------------------------------------------
// Merkle root
// ---------------------------------------------------------------------------

/// BLAKE3 domain tag for internal commitment-tree nodes.
const MERKLE_NODE_DOMAIN: &str = "veil.merkle.node.v1";

/// Combine two child hashes into a parent node hash.
fn merkle_node(left: &Hash, right: &Hash) -> Hash {
    domain_hash(MERKLE_NODE_DOMAIN, &[left.as_bytes(), right.as_bytes()])
}

/// Compute a binary Merkle root over a list of leaves.
///
/// Odd levels duplicate their last element, and a single leaf is paired
/// with itself so the root is always the output of a node hash, never a
/// raw leaf. The empty tree collapses to the all-zero hash sentinel.
/// Duplicate-leaf ambiguity is a non-issue here: commitments carry fresh
/// randomness, so accepted leaves are unique.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::zero();
    }

    if leaves.len() == 1 {
        return merkle_node(&leaves[0], &leaves[0]);
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for chunk in level.chunks(2) {
            let left = &chunk[0];
            let right = chunk.get(1).unwrap_or(left);
            next.push(merkle_node(left, right));
        }
        level = next;
    }

    level[0]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_known_vector() {
        // Keccak-256 of the empty string (the classic Ethereum constant).
        let h = keccak256(b"");
        assert_eq!(
            h.to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn keccak256_multi_matches_concatenation() {
        let a = keccak256(b"hello world");
        let b = keccak256_multi(&[b"hello", b" ", b"world"]);
        assert_eq!(a, b);
    }

    #[test]
    fn domain_hash_separates_contexts() {
        let a = domain_hash("veil.test.a", &[b"same input"]);
        let b = domain_hash("veil.test.b", &[b"same input"]);
        assert_ne!(a, b, "different domains must never collide");
    }

    #[test]
    fn hash_to_field_is_deterministic() {
        assert_eq!(hash_to_field(b"input"), hash_to_field(b"input"));
        assert_ne!(hash_to_field(b"input"), hash_to_field(b"other"));
    }

    #[test]
    fn hash_slice_round_trip() {
        let h = keccak256(b"x");
        assert_eq!(Hash::from_slice(h.as_bytes()), Some(h));
        assert_eq!(Hash::from_slice(&[0u8; 31]), None);
    }

    #[test]
    fn address_from_slice_requires_twenty_bytes() {
        assert!(Address::from_slice(&[7u8; 20]).is_some());
        assert!(Address::from_slice(&[7u8; 19]).is_none());
    }

    #[test]
    fn merkle_root_empty_is_zero() {
        assert_eq!(merkle_root(&[]), Hash::zero());
    }

    #[test]
    fn merkle_root_single_leaf_is_hashed() {
        let leaf = keccak256(b"leaf");
        let root = merkle_root(&[leaf]);
        assert_ne!(root, leaf, "a root must never be a raw leaf");
    }

    #[test]
    fn merkle_root_depends_on_order() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }

    #[test]
    fn merkle_root_grows_deterministically() {
        let leaves: Vec<Hash> = (0u8..5).map(|i| keccak256(&[i])).collect();
        let root = merkle_root(&leaves);
        assert!(!root.is_zero());
        assert_eq!(root, merkle_root(&leaves));
        assert_ne!(root, merkle_root(&leaves[..4]));
    }
}
