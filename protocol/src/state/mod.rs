//! # State & Persistence
//!
//! Everything that outlives a transaction:
//!
//! - **db** — [`ChainDb`], the sled-backed store with one named tree per
//!   concern (accounts, hidden-balance commitments, spent serials, the
//!   commitment list, roots, logs, metadata).
//! - **store** — [`StateBatch`], the per-transaction read-through write
//!   overlay. The handler mutates the overlay; on success the overlay
//!   commits as a unit, on failure (or in simulation) it is dropped and
//!   the database never changes.
//! - **log** — Transaction logs and the 2048-bit block [`Bloom`].
//! - **execution** — The public half of a state transition: nonce, fee,
//!   value transfer, and the transfer log.

pub mod db;
pub mod execution;
pub mod log;
pub mod store;

pub use db::{ChainDb, DbError};
pub use execution::{ExecutionError, ExecutionResult, StateTransition};
pub use log::{Bloom, Log};
pub use store::{AccountState, StateBatch};
