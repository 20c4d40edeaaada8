//! # Protocol Configuration & Constants
//!
//! Chain identity, consensus-critical ceilings, and the per-deployment
//! [`ChainConfig`]. Constants that more than one module depends on live
//! here; everything else stays next to its only user.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Module identity
// ---------------------------------------------------------------------------

/// Module tag carried in the `message` event emitted for every handled
/// transaction.
pub const MODULE_NAME: &str = "veil";

// ---------------------------------------------------------------------------
// Consensus ceilings
// ---------------------------------------------------------------------------

/// Hard ceiling on the size of a zero-knowledge proof blob, in bytes.
///
/// Proof verification is not gas-metered, so an unbounded blob would be a
/// free denial-of-service vector. A compressed Groth16 proof over BN254 is
/// 128 bytes; 4 KiB leaves generous headroom for any proving system we
/// would realistically swap in. The decoder and the proof wrapper both
/// enforce this, so an oversized proof never reaches the pairing check.
pub const MAX_PROOF_BYTES: usize = 4096;

/// Intrinsic gas charged for any transaction before payload execution.
pub const TX_GAS: u64 = 21_000;

// ---------------------------------------------------------------------------
// ChainId
// ---------------------------------------------------------------------------

/// Parsed chain identity.
///
/// Chain identifiers are strings of the form `<name>_<epoch>-<fork>`, e.g.
/// `veil_9000-1`. The numeric `epoch` is what gets folded into signature
/// recovery ids, so two deployments with different epochs can never replay
/// each other's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainId {
    /// Numeric replay-protection epoch (the part between `_` and `-`).
    pub epoch: u64,
    /// Deployment fork counter (the part after `-`).
    pub fork: u64,
}

/// Errors produced when parsing a chain identifier string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainIdError {
    #[error("empty chain id")]
    Empty,

    #[error("malformed chain id {0:?}: expected <name>_<epoch>-<fork>")]
    Malformed(String),

    #[error("chain id {0:?} has a non-numeric epoch or fork")]
    NonNumeric(String),

    #[error("chain id {0:?} has a zero epoch")]
    ZeroEpoch(String),
}

impl ChainId {
    /// Parse a chain identifier string.
    ///
    /// The name segment must be non-empty lowercase ASCII; the epoch must
    /// be a positive base-10 integer. Anything else is rejected — a node
    /// must never guess at its own replay-protection domain.
    pub fn parse(raw: &str) -> Result<Self, ChainIdError> {
        if raw.is_empty() {
            return Err(ChainIdError::Empty);
        }

        let (name, rest) = raw
            .split_once('_')
            .ok_or_else(|| ChainIdError::Malformed(raw.to_string()))?;
        let (epoch_str, fork_str) = rest
            .split_once('-')
            .ok_or_else(|| ChainIdError::Malformed(raw.to_string()))?;

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ChainIdError::Malformed(raw.to_string()));
        }

        let epoch: u64 = epoch_str
            .parse()
            .map_err(|_| ChainIdError::NonNumeric(raw.to_string()))?;
        let fork: u64 = fork_str
            .parse()
            .map_err(|_| ChainIdError::NonNumeric(raw.to_string()))?;

        if epoch == 0 {
            return Err(ChainIdError::ZeroEpoch(raw.to_string()));
        }

        Ok(Self { epoch, fork })
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.epoch, self.fork)
    }
}

// ---------------------------------------------------------------------------
// ChainConfig
// ---------------------------------------------------------------------------

/// Per-deployment configuration, persisted in the metadata tree and loaded
/// by the handler for every transaction. A deployment without a stored
/// config cannot execute transactions at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The full chain identifier string (see [`ChainId::parse`]).
    pub chain_id: String,

    /// Whether the Update (balance re-randomization) operation is accepted.
    ///
    /// Update is implemented symmetrically to the other confidential
    /// operations but must be explicitly declared by the deployer; a chain
    /// that has not opted in rejects Update transactions outright.
    pub update_enabled: bool,

    /// Minimum gas price a transaction must offer to be executed.
    pub min_gas_price: u128,
}

impl ChainConfig {
    /// A config with the given chain id, Update disabled, and no gas floor.
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            update_enabled: false,
            min_gas_price: 0,
        }
    }

    /// Enable the Update operation (a deliberate deployer action).
    pub fn with_update_enabled(mut self) -> Self {
        self.update_enabled = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_well_formed_chain_id() {
        let id = ChainId::parse("veil_9000-1").unwrap();
        assert_eq!(id.epoch, 9000);
        assert_eq!(id.fork, 1);
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(ChainId::parse(""), Err(ChainIdError::Empty));
    }

    #[test]
    fn parse_rejects_missing_separators() {
        assert!(matches!(
            ChainId::parse("veil9000-1"),
            Err(ChainIdError::Malformed(_))
        ));
        assert!(matches!(
            ChainId::parse("veil_9000"),
            Err(ChainIdError::Malformed(_))
        ));
    }

    #[test]
    fn parse_rejects_non_numeric_epoch() {
        assert!(matches!(
            ChainId::parse("veil_main-1"),
            Err(ChainIdError::NonNumeric(_))
        ));
    }

    #[test]
    fn parse_rejects_zero_epoch() {
        assert!(matches!(
            ChainId::parse("veil_0-1"),
            Err(ChainIdError::ZeroEpoch(_))
        ));
    }

    #[test]
    fn parse_rejects_uppercase_name() {
        assert!(matches!(
            ChainId::parse("VEIL_9000-1"),
            Err(ChainIdError::Malformed(_))
        ));
    }

    #[test]
    fn chain_config_defaults() {
        let config = ChainConfig::new("veil_9000-1");
        assert!(!config.update_enabled);
        assert!(config.with_update_enabled().update_enabled);
    }
}
