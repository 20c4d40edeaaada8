//! Transaction logs and the block bloom filter.
//!
//! Logs are indexed under the transaction hash they belong to; the block
//! bloom is the 2048-bit filter every log's address and topics are folded
//! into, so light clients can cheaply test "might this block mention X".
//!
//! The bloom uses the classic 3-bit-of-11 scheme: Keccak-256 the input,
//! take three big-endian byte pairs, mask each to 11 bits, set those three
//! bits. Membership tests require all three.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::hash::{keccak256, Address, Hash};

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// A single execution log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// The account that emitted the log.
    pub address: Address,
    /// Indexed topics (at most four by convention).
    pub topics: Vec<Hash>,
    /// Unindexed payload.
    pub data: Vec<u8>,
    /// Hash of the transaction that produced this log.
    pub tx_hash: Hash,
    /// Position of that transaction within its block.
    pub tx_index: u64,
    /// Position of this log within the transaction.
    pub index: u64,
}

// ---------------------------------------------------------------------------
// Bloom
// ---------------------------------------------------------------------------

/// A 2048-bit bloom filter.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Bloom(pub [u8; 256]);

impl Bloom {
    /// The empty filter.
    pub const fn zero() -> Self {
        Self([0u8; 256])
    }

    /// Returns `true` if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Fold an input into the filter.
    pub fn accrue(&mut self, input: &[u8]) {
        for bit in Self::bits(input) {
            self.0[bit / 8] |= 1 << (bit % 8);
        }
    }

    /// Fold a log's address and topics into the filter.
    pub fn accrue_log(&mut self, log: &Log) {
        self.accrue(log.address.as_bytes());
        for topic in &log.topics {
            self.accrue(topic.as_bytes());
        }
    }

    /// Union another filter into this one.
    pub fn or_assign(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
    }

    /// Test whether an input *may* have been accrued. False positives are
    /// expected; false negatives are impossible.
    pub fn contains_input(&self, input: &[u8]) -> bool {
        Self::bits(input)
            .iter()
            .all(|&bit| self.0[bit / 8] & (1 << (bit % 8)) != 0)
    }

    fn bits(input: &[u8]) -> [usize; 3] {
        let digest = keccak256(input);
        let d = digest.as_bytes();
        let mut bits = [0usize; 3];
        for (slot, i) in [0usize, 2, 4].iter().enumerate() {
            bits[slot] = (((d[*i] as usize) << 8) | d[i + 1] as usize) & 0x7FF;
        }
        bits
    }

    /// The raw filter bytes.
    pub fn as_bytes(&self) -> &[u8; 256] {
        &self.0
    }

    /// Reconstruct from raw bytes. Returns `None` unless exactly 256 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 256] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl Default for Bloom {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bloom(0x{}…)", hex::encode(&self.0[..8]))
    }
}

/// Build the bloom contribution of a set of logs.
pub fn logs_bloom<'a, I>(logs: I) -> Bloom
where
    I: IntoIterator<Item = &'a Log>,
{
    let mut bloom = Bloom::zero();
    for log in logs {
        bloom.accrue_log(log);
    }
    bloom
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> Log {
        Log {
            address: Address([1u8; 20]),
            topics: vec![keccak256(b"topic")],
            data: vec![9, 9],
            tx_hash: keccak256(b"tx"),
            tx_index: 0,
            index: 0,
        }
    }

    #[test]
    fn empty_bloom_contains_nothing_definitely() {
        let bloom = Bloom::zero();
        assert!(bloom.is_zero());
        assert!(!bloom.contains_input(b"anything"));
    }

    #[test]
    fn accrued_input_is_contained() {
        let mut bloom = Bloom::zero();
        bloom.accrue(b"hello");
        assert!(bloom.contains_input(b"hello"));
    }

    #[test]
    fn log_accrual_covers_address_and_topics() {
        let log = sample_log();
        let bloom = logs_bloom([&log]);
        assert!(bloom.contains_input(log.address.as_bytes()));
        assert!(bloom.contains_input(log.topics[0].as_bytes()));
    }

    #[test]
    fn or_assign_is_a_union() {
        let mut a = Bloom::zero();
        a.accrue(b"left");
        let mut b = Bloom::zero();
        b.accrue(b"right");

        a.or_assign(&b);
        assert!(a.contains_input(b"left"));
        assert!(a.contains_input(b"right"));
    }

    #[test]
    fn bloom_bytes_round_trip() {
        let mut bloom = Bloom::zero();
        bloom.accrue(b"payload");
        let restored = Bloom::from_bytes(bloom.as_bytes()).unwrap();
        assert_eq!(restored, bloom);
        assert!(Bloom::from_bytes(&[0u8; 255]).is_none());
    }

    #[test]
    fn log_serde_round_trip() {
        let log = sample_log();
        let bytes = bincode::serialize(&log).unwrap();
        let restored: Log = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, log);
    }
}
