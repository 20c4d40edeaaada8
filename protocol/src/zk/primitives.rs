//! # Commitment & Serial Primitives
//!
//! The three pure functions the confidential layer is built on, plus the
//! two derived sentinels:
//!
//! - [`prf`] — domain-separated pseudo-random function over two 32-byte
//!   inputs. Serial numbers are PRF outputs; publishing one proves a note
//!   was spent without revealing which.
//! - [`comm`] — hiding, binding commitment to a 64-bit value under a
//!   32-byte randomness. Hidden balances and transfer amounts are carried
//!   as commitments only.
//! - [`initial_serial`] — `SN₀`, the "unused" sentinel derived from the
//!   fixed system address. An account's very first confidential
//!   transaction has no predecessor serial, so it carries `SN₀`; the
//!   spent-set check deliberately never fires for it.
//! - [`zero_balance_commitment`] — the canonical commitment every account
//!   starts from before its first confidential operation.

use std::sync::OnceLock;

use crate::crypto::hash::{domain_hash, Address, Hash};

/// BLAKE3 domain tag for the serial-number PRF.
const PRF_DOMAIN: &str = "veil.prf.v1";

/// BLAKE3 domain tag for value commitments.
const COMM_DOMAIN: &str = "veil.comm.v1";

/// The fixed system address the `SN₀` sentinel is derived from.
///
/// No keypair exists for this address; it is an agreed-upon constant, so
/// every node derives the identical sentinel.
pub const SYSTEM_ADDRESS: Address = Address(*b"veil/system/address\0");

/// Domain-separated pseudo-random function over two 32-byte inputs.
pub fn prf(a: &Hash, b: &Hash) -> Hash {
    domain_hash(PRF_DOMAIN, &[a.as_bytes(), b.as_bytes()])
}

/// Hiding, binding commitment to a 64-bit non-negative value.
///
/// The value is bound little-endian together with the full 32-byte
/// randomness; hiding holds as long as the randomness is secret and
/// uniform, binding follows from collision resistance.
pub fn comm(value: u64, randomness: &Hash) -> Hash {
    domain_hash(COMM_DOMAIN, &[&value.to_le_bytes(), randomness.as_bytes()])
}

/// The `SN₀` sentinel: `PRF(keccak(SYSTEM_ADDRESS), 0³²)`.
///
/// Any transaction carrying this serial bypasses the spent-set check, and
/// the sentinel itself is never considered spent — it stays usable for
/// every account's first confidential transaction, forever.
pub fn initial_serial() -> Hash {
    static SN0: OnceLock<Hash> = OnceLock::new();
    *SN0.get_or_init(|| prf(&SYSTEM_ADDRESS.hash(), &Hash::zero()))
}

/// The canonical commitment to a zero hidden balance: `COMM(0, 0³²)`.
///
/// Accounts that have never used the confidential layer report this as
/// their balance commitment; it is what the first Mint proof opens against.
pub fn zero_balance_commitment() -> Hash {
    static ZERO: OnceLock<Hash> = OnceLock::new();
    *ZERO.get_or_init(|| comm(0, &Hash::zero()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    #[test]
    fn prf_is_deterministic_and_position_sensitive() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_eq!(prf(&a, &b), prf(&a, &b));
        assert_ne!(prf(&a, &b), prf(&b, &a), "PRF must not be symmetric");
    }

    #[test]
    fn comm_binds_value_and_randomness() {
        let r = keccak256(b"randomness");
        assert_eq!(comm(100, &r), comm(100, &r));
        assert_ne!(comm(100, &r), comm(101, &r));
        assert_ne!(comm(100, &r), comm(100, &keccak256(b"other")));
    }

    #[test]
    fn prf_and_comm_domains_do_not_collide() {
        // Same raw input bytes through both functions must differ.
        let r = Hash::zero();
        assert_ne!(prf(&r, &r), comm(0, &r));
    }

    #[test]
    fn initial_serial_is_stable() {
        assert_eq!(initial_serial(), initial_serial());
        assert_eq!(
            initial_serial(),
            prf(&SYSTEM_ADDRESS.hash(), &Hash::zero()),
            "sentinel derivation is fixed by the system address"
        );
    }

    #[test]
    fn zero_balance_commitment_is_comm_of_zero() {
        assert_eq!(zero_balance_commitment(), comm(0, &Hash::zero()));
        assert_ne!(zero_balance_commitment(), initial_serial());
    }
}
