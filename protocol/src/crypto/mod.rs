//! # Cryptographic Primitives
//!
//! Low-level building blocks shared by the rest of the protocol:
//!
//! - **hash** — The `Hash`/`Address` value types, Keccak-256 for anything
//!   visible to the account model (transaction hashes, addresses, bloom
//!   indexing), BLAKE3 for protocol-native derivations, and the
//!   hash-to-field mapping used to feed byte values into BN254 circuits.
//! - **keys** — Recoverable ECDSA over secp256k1. Senders are recovered
//!   from `{v, r, s}` with the chain epoch folded into `v`; Deposit
//!   transactions carry a second, Homestead-style signature made with the
//!   recipient's one-time key.

pub mod hash;
pub mod keys;

pub use hash::{Address, Hash};
pub use keys::{Keypair, OneTimeKey, PublicKey, RecoverableSignature};
