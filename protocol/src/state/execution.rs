//! The public half of a state transition.
//!
//! After the confidential branch has verified proofs and staged its
//! deltas, every transaction — confidential or not — runs the ordinary
//! public effects: gas and nonce checks, fee charge, value transfer, and
//! the transfer log whose bloom contribution folds into the block bloom.
//!
//! Contract execution itself is the enclosing pipeline's job; what lives
//! here is the deterministic accounting every node must agree on before
//! that pipeline runs.

use thiserror::Error;

use crate::config::{ChainConfig, TX_GAS};
use crate::crypto::hash::{keccak256, Address, Hash};

use super::db::DbError;
use super::log::{logs_bloom, Bloom, Log};
use super::store::StateBatch;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures of the public state transition.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    #[error("gas limit {limit} below intrinsic cost {required}")]
    GasLimitTooLow { limit: u64, required: u64 },

    #[error("gas price {offered} below the chain minimum {minimum}")]
    GasPriceTooLow { offered: u128, minimum: u128 },

    #[error("fee computation overflowed")]
    FeeOverflow,

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// What a completed public transition hands back to the handler.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Logs emitted by the transition, already stamped with the prepared
    /// transaction context.
    pub logs: Vec<Log>,
    /// The bloom contribution of those logs.
    pub bloom: Bloom,
    /// Gas consumed.
    pub gas_used: u64,
}

// ---------------------------------------------------------------------------
// StateTransition
// ---------------------------------------------------------------------------

/// The flattened inputs of one state transition, assembled by the handler
/// preamble from the decoded message and its recovered sender.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub recipient: Option<Address>,
    pub amount: u128,
    pub payload: Vec<u8>,
    pub sender: Address,
    /// Numeric chain epoch (already parsed).
    pub chain_epoch: u64,
    /// Canonical hash of the enclosing transaction.
    pub tx_hash: Hash,
    /// Whether this is a check-tx simulation pass.
    pub simulate: bool,
}

/// Topic carried by every value-transfer log.
fn transfer_topic() -> Hash {
    keccak256(b"veil.transfer.v1")
}

impl StateTransition {
    /// Run the public transition against the overlay.
    ///
    /// Checks run cheapest-first; the overlay is only mutated once every
    /// check has passed, so a failed transition stages nothing.
    pub fn transition_db(
        &self,
        batch: &mut StateBatch<'_>,
        config: &ChainConfig,
    ) -> Result<ExecutionResult, ExecutionError> {
        if self.gas_limit < TX_GAS {
            return Err(ExecutionError::GasLimitTooLow {
                limit: self.gas_limit,
                required: TX_GAS,
            });
        }

        if self.gas_price < config.min_gas_price {
            return Err(ExecutionError::GasPriceTooLow {
                offered: self.gas_price,
                minimum: config.min_gas_price,
            });
        }

        let mut sender_state = batch.account(&self.sender)?;
        if sender_state.nonce != self.nonce {
            return Err(ExecutionError::InvalidNonce {
                expected: sender_state.nonce,
                got: self.nonce,
            });
        }

        let fee = self
            .gas_price
            .checked_mul(u128::from(TX_GAS))
            .ok_or(ExecutionError::FeeOverflow)?;
        let total = self
            .amount
            .checked_add(fee)
            .ok_or(ExecutionError::FeeOverflow)?;

        if sender_state.balance < total {
            return Err(ExecutionError::InsufficientBalance {
                have: sender_state.balance,
                need: total,
            });
        }

        // All checks passed; stage the effects.
        sender_state.balance -= total;
        sender_state.nonce += 1;
        batch.set_account(self.sender, sender_state);

        if let Some(recipient) = self.recipient {
            let mut recipient_state = batch.account(&recipient)?;
            recipient_state.balance += self.amount;
            batch.set_account(recipient, recipient_state);
        }

        let (tx_hash, tx_index) = batch.tx_context();
        let logs = vec![Log {
            address: self.sender,
            topics: vec![
                transfer_topic(),
                self.sender.hash(),
                self.recipient.map(|r| r.hash()).unwrap_or_default(),
            ],
            data: self.amount.to_be_bytes().to_vec(),
            tx_hash,
            tx_index,
            index: 0,
        }];
        let bloom = logs_bloom(logs.iter());

        tracing::debug!(
            sender = %self.sender,
            amount = self.amount,
            simulate = self.simulate,
            "public transition applied"
        );

        Ok(ExecutionResult {
            logs,
            bloom,
            gas_used: TX_GAS,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::db::ChainDb;
    use crate::state::store::AccountState;

    fn setup() -> (ChainDb, ChainConfig) {
        (
            ChainDb::open_temporary().expect("temp db"),
            ChainConfig::new("veil_9000-1"),
        )
    }

    fn transition(sender: Address, amount: u128, recipient: Option<Address>) -> StateTransition {
        StateTransition {
            nonce: 0,
            gas_price: 1,
            gas_limit: TX_GAS,
            recipient,
            amount,
            payload: vec![],
            sender,
            chain_epoch: 9000,
            tx_hash: keccak256(b"tx"),
            simulate: false,
        }
    }

    #[test]
    fn transfer_moves_value_and_bumps_nonce() {
        let (db, config) = setup();
        let sender = Address([1u8; 20]);
        let recipient = Address([2u8; 20]);
        db.put_account(&sender, &AccountState::with_balance(1_000_000))
            .unwrap();

        let mut batch = StateBatch::new(&db);
        let st = transition(sender, 500, Some(recipient));
        let result = st.transition_db(&mut batch, &config).unwrap();

        assert_eq!(result.gas_used, TX_GAS);
        assert_eq!(result.logs.len(), 1);
        assert_eq!(batch.account(&recipient).unwrap().balance, 500);
        let sender_state = batch.account(&sender).unwrap();
        assert_eq!(sender_state.nonce, 1);
        assert_eq!(
            sender_state.balance,
            1_000_000 - 500 - u128::from(TX_GAS)
        );
    }

    #[test]
    fn wrong_nonce_is_rejected() {
        let (db, config) = setup();
        let sender = Address([1u8; 20]);
        db.put_account(&sender, &AccountState::with_balance(1_000_000))
            .unwrap();

        let mut batch = StateBatch::new(&db);
        let mut st = transition(sender, 1, None);
        st.nonce = 5;
        assert!(matches!(
            st.transition_db(&mut batch, &config),
            Err(ExecutionError::InvalidNonce {
                expected: 0,
                got: 5
            })
        ));
        assert!(!batch.is_dirty(), "failed transition must stage nothing");
    }

    #[test]
    fn insufficient_balance_is_rejected() {
        let (db, config) = setup();
        let sender = Address([1u8; 20]);
        db.put_account(&sender, &AccountState::with_balance(10))
            .unwrap();

        let mut batch = StateBatch::new(&db);
        let st = transition(sender, 5, None);
        assert!(matches!(
            st.transition_db(&mut batch, &config),
            Err(ExecutionError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn gas_limit_below_intrinsic_is_rejected() {
        let (db, config) = setup();
        let mut batch = StateBatch::new(&db);
        let mut st = transition(Address([1u8; 20]), 0, None);
        st.gas_limit = TX_GAS - 1;
        assert!(matches!(
            st.transition_db(&mut batch, &config),
            Err(ExecutionError::GasLimitTooLow { .. })
        ));
    }

    #[test]
    fn gas_price_below_minimum_is_rejected() {
        let (db, mut config) = setup();
        config.min_gas_price = 100;
        let mut batch = StateBatch::new(&db);
        let st = transition(Address([1u8; 20]), 0, None);
        assert!(matches!(
            st.transition_db(&mut batch, &config),
            Err(ExecutionError::GasPriceTooLow { .. })
        ));
    }

    #[test]
    fn transfer_log_carries_prepared_context() {
        let (db, config) = setup();
        let sender = Address([1u8; 20]);
        db.put_account(&sender, &AccountState::with_balance(1_000_000))
            .unwrap();

        let mut batch = StateBatch::new(&db);
        let tx_hash = keccak256(b"the tx");
        batch.prepare(tx_hash, 3);

        let st = transition(sender, 1, Some(Address([2u8; 20])));
        let result = st.transition_db(&mut batch, &config).unwrap();

        assert_eq!(result.logs[0].tx_hash, tx_hash);
        assert_eq!(result.logs[0].tx_index, 3);
        assert!(result.bloom.contains_input(sender.as_bytes()));
    }
}
