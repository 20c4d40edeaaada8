// Copyright (c) 2026 VEIL Contributors. MIT License.
// See LICENSE for details.

//! # VEIL Protocol — Core Library
//!
//! VEIL is a confidential-value transaction layer for an account-based
//! chain. Alongside ordinary public transfers, accounts carry a hidden
//! balance represented by a single commitment; five zero-knowledge-protected
//! operations move value in and out of hiding:
//!
//! - **Mint** — credit the hidden balance from a cleartext public amount.
//! - **Send** — transfer between hidden balances via a transfer commitment.
//! - **Deposit** — claim a transfer commitment with a one-time-key proof.
//! - **Redeem** — debit the hidden balance into a cleartext public amount.
//! - **Update** — re-randomize a hidden balance against a current tree root.
//!
//! Every full node must accept or reject identically, so the handler is
//! written for determinism first: serial-number bookkeeping, proof
//! verification, and state deltas all happen inside a per-transaction write
//! batch that either commits whole or is discarded.
//!
//! ## Architecture
//!
//! - **config** — Chain identity, the update-operation switch, gas and
//!   proof-size ceilings.
//! - **crypto** — Hashes, addresses, and recoverable secp256k1 signatures.
//! - **zk** — Serial/commitment primitives and the Groth16 verifier for the
//!   five confidential operations.
//! - **transaction** — The extended transaction record, its canonical
//!   binary encoding, signing, and construction.
//! - **state** — Persistent storage (sled), the per-transaction write
//!   batch, logs, blooms, and the public state transition.
//! - **handler** — The state-transition core that ties it all together.
//! - **events** — The event stream attached to every handled transaction.
//!
//! ## Design Philosophy
//!
//! 1. Determinism over convenience — consensus code never reads clocks,
//!    RNGs, or iteration orders that can differ between nodes.
//! 2. Illegal states are unrepresentable — transaction kinds are a closed
//!    sum with per-variant required fields, not a byte code plus optionals.
//! 3. Every failure is a typed, propagated error. Nothing is swallowed.

pub mod config;
pub mod crypto;
pub mod events;
pub mod handler;
pub mod state;
pub mod transaction;
pub mod zk;
