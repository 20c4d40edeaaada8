//! # Transactions
//!
//! The extended transaction record and everything that gives it meaning:
//!
//! - **types** — [`Transaction`], the closed [`TxKind`] sum with
//!   per-variant required fields, the chain-native transfer message, and
//!   the top-level [`Msg`] envelope.
//! - **encoding** — The canonical length-prefixed binary form used for
//!   hashing, signing, and the wire; a total decoder in which unknown
//!   kinds and illegal field combinations are decode-time errors.
//! - **signing** — Transaction hash, sighash with the chain epoch folded
//!   in, sender recovery, and the Deposit auxiliary signature.
//! - **builder** — Fluent construction for wallets and tests.

pub mod builder;
pub mod encoding;
pub mod signing;
pub mod types;

pub use builder::TransactionBuilder;
pub use encoding::DecodeError;
pub use signing::{recover_sender, sign_transaction, transaction_hash};
pub use types::{Msg, NativeTransfer, Transaction, TxKind};
