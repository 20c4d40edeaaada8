//! # Zero-Knowledge Subsystem
//!
//! Everything the chain needs to *check* confidential operations, plus the
//! wallet-side half used to produce them in development and tests. Groth16
//! over BN254, one verifying key per operation:
//!
//! ```text
//! primitives.rs — PRF, commitments, the SN₀ sentinel, zero-balance commitment
//! circuit.rs    — input-binding R1CS used by the local dev ceremony
//! proof.rs      — ZkProof blob wrapper (size cap + validated deserialization)
//! prover.rs     — TransferProver: per-operation proving keys, dev setup
//! verifier.rs   — TransferVerifier: the five consensus-side entry points
//! ```
//!
//! ## Consensus posture
//!
//! Verification is stateless, deterministic, and side-effect-free: the
//! verifier owns nothing but five verifying keys, and a failed check is a
//! typed error the handler turns into a transaction rejection *before* any
//! state is touched. Public inputs are BN254 scalars derived from chain
//! state and transaction fields via `hash_to_field`, so the proof is bound
//! to the exact commitment, serial, and root values the handler saw.
//!
//! The production constraint systems are compiled by the external proving
//! toolchain and shipped as verifying keys. [`prover::TransferProver::setup`]
//! runs a local single-party ceremony over the input-binding circuit so
//! development networks and tests can mint accepting proofs; production
//! deployments replace it with MPC-generated keys.

pub mod circuit;
pub mod primitives;
pub mod proof;
pub mod prover;
pub mod verifier;

pub use primitives::{comm, initial_serial, prf, zero_balance_commitment, SYSTEM_ADDRESS};
pub use proof::ZkProof;
pub use prover::TransferProver;
pub use verifier::{TransferVerifier, VerifyError};

/// Number of public inputs in each operation's statement, in verifier order.
pub const MINT_INPUTS: usize = 4;
pub const SEND_INPUTS: usize = 4;
pub const DEPOSIT_INPUTS: usize = 6;
pub const REDEEM_INPUTS: usize = 4;
pub const UPDATE_INPUTS: usize = 3;
