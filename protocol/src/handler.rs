//! # The State-Transition Core
//!
//! [`Handler::handle`] is the consensus entry point: it takes a decoded
//! [`Msg`] and either applies it completely or rejects it with a typed
//! error and zero state change. The flow for an extended transaction:
//!
//! 1. **Preamble** — parse the chain id, compute the canonical hash,
//!    recover the sender, build the [`StateTransition`], prepare the log
//!    buffer and advance the block-local transaction counter (skipped in
//!    simulation), and load the [`ChainConfig`].
//! 2. **Confidential branch** — for non-Public kinds: the serial-number
//!    uniqueness check (with the `SN₀` bypass), the operation's proof
//!    verification, and — only after the proof holds — marking the serial
//!    spent, replacing the hidden-balance commitment, and appending the
//!    new commitments to the tree.
//! 3. **Public execution** — nonce/fee/value accounting via
//!    [`StateTransition::transition_db`].
//! 4. **Persistence** — fold the execution bloom into the block bloom,
//!    stage the logs, and commit the whole overlay. A commit failure is
//!    fatal to block execution: retrying or skipping would let nodes
//!    diverge.
//! 5. **Events** — the kind-tagged event, the module/sender message
//!    event, and the recipient event when present.
//!
//! ## Simulation
//!
//! A check-tx pass (`Context::simulate`) runs *every* check — signature,
//! serials, proofs, public accounting — so mempool admission mirrors
//! block execution exactly, but skips the counter, the log buffer, the
//! bloom fold, and the final commit. A simulated transaction is run only
//! on the node it was submitted to; letting it advance shared counters
//! would fork that node's state from everyone else's.
//!
//! ## Block boundaries
//!
//! The handler executes on the consensus thread, one transaction at a
//! time. [`Handler::begin_block`] resets the per-block counter and bloom;
//! [`Handler::seal_block`] advances the commitment-tree root for the
//! height and persists the folded bloom.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ChainConfig, ChainId, ChainIdError, MODULE_NAME};
use crate::crypto::hash::{keccak256, merkle_root, Address, Hash};
use crate::events::{
    Event, ATTR_KEY_AMOUNT, ATTR_KEY_KIND, ATTR_KEY_MODULE, ATTR_KEY_RECIPIENT, ATTR_KEY_SENDER,
    EVENT_TYPE_MESSAGE, EVENT_TYPE_NATIVE, EVENT_TYPE_TX,
};
use crate::state::db::{ChainDb, DbError};
use crate::state::execution::{ExecutionError, StateTransition};
use crate::state::log::Bloom;
use crate::state::store::StateBatch;
use crate::transaction::signing::{recover_deposit_signer, recover_sender, transaction_hash};
use crate::transaction::types::{Msg, NativeTransfer, Transaction, TxKind};
use crate::zk::primitives::initial_serial;
use crate::zk::verifier::{TransferVerifier, VerifyError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything `handle` can reject a message with.
///
/// Proof and signature failures are ordinary user-visible rejections;
/// [`HandlerError::LogPersist`] is an infrastructure failure and aborts
/// block execution.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("chain id unparseable: {0}")]
    ChainId(#[from] ChainIdError),

    #[error("chain config not found")]
    ChainConfigNotFound,

    #[error("invalid transaction signature")]
    InvalidSignature,

    #[error("invalid deposit signature")]
    InvalidDepositSignature,

    #[error("serial number already used: {0}")]
    SerialAlreadyUsed(Hash),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("update operation not enabled on this chain")]
    UpdateDisabled,

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Post-execution persistence failed. Fatal: the block cannot proceed
    /// without its logs and state deltas on disk.
    #[error("log persistence failed: {0}")]
    LogPersist(DbError),

    #[error("database error: {0}")]
    Db(DbError),
}

// ---------------------------------------------------------------------------
// Context & result
// ---------------------------------------------------------------------------

/// Per-call execution context supplied by the surrounding runtime.
#[derive(Debug, Clone)]
pub struct Context {
    /// The raw chain identifier string (e.g. `veil_9000-1`).
    pub chain_id: String,
    /// `true` for the mempool's check-tx pass.
    pub simulate: bool,
}

impl Context {
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            simulate: false,
        }
    }

    pub fn simulated(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            simulate: true,
        }
    }
}

/// The outcome of a successfully handled message.
#[derive(Debug, Clone)]
pub struct TxResult {
    /// The emitted event stream.
    pub events: Vec<Event>,
    /// Gas consumed by the public execution.
    pub gas_used: u64,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// The dispatcher that owns block-local execution state.
pub struct Handler {
    db: ChainDb,
    verifier: TransferVerifier,
    height: u64,
    tx_count: u64,
    block_bloom: Bloom,
}

impl Handler {
    pub fn new(db: ChainDb, verifier: TransferVerifier) -> Self {
        Self {
            db,
            verifier,
            height: 0,
            tx_count: 0,
            block_bloom: Bloom::zero(),
        }
    }

    /// The underlying database (genesis seeding, queries, tests).
    pub fn db(&self) -> &ChainDb {
        &self.db
    }

    /// Block-local transaction count so far.
    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    /// The bloom folded from every executed transaction this block.
    pub fn block_bloom(&self) -> &Bloom {
        &self.block_bloom
    }

    /// Start a new block: reset the transaction counter and block bloom.
    pub fn begin_block(&mut self, height: u64) {
        self.height = height;
        self.tx_count = 0;
        self.block_bloom = Bloom::zero();
    }

    /// Handle one decoded message.
    pub fn handle(&mut self, ctx: &Context, msg: &Msg) -> Result<TxResult, HandlerError> {
        match msg {
            Msg::Extended(tx) => self.handle_extended(ctx, tx),
            Msg::Native(transfer) => self.handle_native(ctx, transfer),
        }
    }

    /// Seal the current block: record the commitment-tree root and the
    /// folded bloom for this height, and return both.
    pub fn seal_block(&mut self) -> Result<(Hash, Bloom), HandlerError> {
        let leaves = self.db.all_commitments().map_err(HandlerError::Db)?;
        let root = merkle_root(&leaves);
        self.db
            .put_root(self.height, &root)
            .map_err(HandlerError::Db)?;
        self.db
            .put_block_bloom(self.height, &self.block_bloom)
            .map_err(HandlerError::Db)?;

        info!(
            height = self.height,
            root = %root,
            txs = self.tx_count,
            "block sealed"
        );
        Ok((root, self.block_bloom))
    }

    // -- Extended transactions ----------------------------------------------

    fn handle_extended(
        &mut self,
        ctx: &Context,
        tx: &Transaction,
    ) -> Result<TxResult, HandlerError> {
        let chain = ChainId::parse(&ctx.chain_id)?;
        let tx_hash = transaction_hash(tx);

        let sender = recover_sender(tx, chain.epoch).map_err(|e| {
            debug!(hash = %tx_hash, reason = %e, "sender recovery failed");
            HandlerError::InvalidSignature
        })?;

        let st = StateTransition {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            recipient: tx.recipient,
            amount: tx.amount,
            payload: tx.payload.clone(),
            sender,
            chain_epoch: chain.epoch,
            tx_hash,
            simulate: ctx.simulate,
        };

        let mut batch = StateBatch::new(&self.db);

        // A simulated transaction runs only on the node it was submitted
        // to; advancing the shared counter or touching the log buffer
        // there would make that node's state diverge from the rest.
        if !ctx.simulate {
            batch.prepare(tx_hash, self.tx_count);
            self.tx_count += 1;
        }

        let config = batch
            .chain_config()
            .map_err(HandlerError::Db)?
            .ok_or(HandlerError::ChainConfigNotFound)?;

        self.apply_confidential(&mut batch, &sender, tx, &config)?;

        let execution = st.transition_db(&mut batch, &config)?;

        if !ctx.simulate {
            self.block_bloom.or_assign(&execution.bloom);
            batch.set_logs(tx_hash, execution.logs.clone());
        }

        let mut events = vec![
            Event::new(EVENT_TYPE_TX)
                .attr(ATTR_KEY_KIND, tx.kind.name())
                .attr(ATTR_KEY_AMOUNT, tx.amount.to_string()),
            Event::new(EVENT_TYPE_MESSAGE)
                .attr(ATTR_KEY_MODULE, MODULE_NAME)
                .attr(ATTR_KEY_SENDER, sender.to_hex()),
        ];
        if let Some(recipient) = &tx.recipient {
            events.push(Event::new(EVENT_TYPE_TX).attr(ATTR_KEY_RECIPIENT, recipient.to_hex()));
        }

        if !ctx.simulate {
            batch.commit().map_err(HandlerError::LogPersist)?;
        }

        info!(
            hash = %tx_hash,
            kind = %tx.kind,
            sender = %sender,
            simulate = ctx.simulate,
            "transaction executed"
        );

        Ok(TxResult {
            events,
            gas_used: execution.gas_used,
        })
    }

    /// The kind-specific confidential branch: serial check, proof
    /// verification, then — and only then — the staged state deltas.
    fn apply_confidential(
        &self,
        batch: &mut StateBatch<'_>,
        sender: &Address,
        tx: &Transaction,
        config: &ChainConfig,
    ) -> Result<(), HandlerError> {
        match &tx.kind {
            TxKind::Public => Ok(()),

            TxKind::Mint(d) => {
                self.ensure_serial_unspent(batch, &d.serial)?;
                let old_balance = batch.cmt_balance(sender).map_err(HandlerError::Db)?;
                self.verifier
                    .verify_mint(&old_balance, &d.serial, &d.commitment, d.value, &d.proof)?;

                batch.mark_serial_spent(d.serial);
                batch.set_cmt_balance(*sender, d.commitment);
                batch.insert_commitment(d.commitment);
                Ok(())
            }

            TxKind::Send(d) => {
                self.ensure_serial_unspent(batch, &d.serial)?;
                let old_balance = batch.cmt_balance(sender).map_err(HandlerError::Db)?;
                self.verifier.verify_send(
                    &d.serial,
                    &d.transfer_commitment,
                    &d.proof,
                    &old_balance,
                    &d.commitment,
                )?;

                batch.mark_serial_spent(d.serial);
                batch.set_cmt_balance(*sender, d.commitment);
                batch.insert_commitment(d.commitment);
                // The transfer commitment is what the recipient's Deposit
                // will prove membership of.
                batch.insert_commitment(d.transfer_commitment);
                Ok(())
            }

            TxKind::Deposit(d) => {
                self.ensure_serial_unspent(batch, &d.serial)?;

                // The auxiliary signature must recover to the address the
                // declared one-time key pins.
                let signer = recover_deposit_signer(tx).map_err(|e| {
                    debug!(reason = %e, "deposit signature recovery failed");
                    HandlerError::InvalidDepositSignature
                })?;
                if signer != d.one_time_key.address() {
                    return Err(HandlerError::InvalidDepositSignature);
                }

                let old_balance = batch.cmt_balance(sender).map_err(HandlerError::Db)?;
                self.verifier.verify_deposit(
                    &d.one_time_key,
                    &d.root,
                    &old_balance,
                    &d.serial,
                    &d.commitment,
                    &d.sender_serial,
                    &d.proof,
                )?;

                batch.mark_serial_spent(d.serial);
                batch.set_cmt_balance(*sender, d.commitment);
                batch.insert_commitment(d.commitment);
                Ok(())
            }

            TxKind::Redeem(d) => {
                self.ensure_serial_unspent(batch, &d.serial)?;
                let old_balance = batch.cmt_balance(sender).map_err(HandlerError::Db)?;
                self.verifier
                    .verify_redeem(&old_balance, &d.serial, &d.commitment, d.value, &d.proof)?;

                batch.mark_serial_spent(d.serial);
                batch.set_cmt_balance(*sender, d.commitment);
                batch.insert_commitment(d.commitment);
                Ok(())
            }

            TxKind::Update(d) => {
                // The deployer declares whether Update is part of this
                // chain; undeclared deployments reject it outright.
                if !config.update_enabled {
                    return Err(HandlerError::UpdateDisabled);
                }

                self.ensure_serial_unspent(batch, &d.serial)?;
                let old_balance = batch.cmt_balance(sender).map_err(HandlerError::Db)?;
                self.verifier
                    .verify_update(&old_balance, &d.root, &d.commitment, &d.proof)?;

                batch.mark_serial_spent(d.serial);
                batch.set_cmt_balance(*sender, d.commitment);
                Ok(())
            }
        }
    }

    /// The anti-double-spend check. `SN₀` always passes: the sentinel is
    /// permanently "unseen" so an account's first confidential transaction
    /// (which has no predecessor serial) is admissible any number of
    /// times.
    fn ensure_serial_unspent(
        &self,
        batch: &StateBatch<'_>,
        serial: &Hash,
    ) -> Result<(), HandlerError> {
        if *serial != initial_serial() && batch.is_serial_spent(serial).map_err(HandlerError::Db)? {
            return Err(HandlerError::SerialAlreadyUsed(*serial));
        }
        Ok(())
    }

    // -- Native transfers ---------------------------------------------------

    fn handle_native(
        &mut self,
        ctx: &Context,
        transfer: &NativeTransfer,
    ) -> Result<TxResult, HandlerError> {
        let chain = ChainId::parse(&ctx.chain_id)?;
        // Native messages are authenticated by the enclosing envelope; the
        // canonical hash is over the message encoding itself.
        let tx_hash = keccak256(&Msg::Native(transfer.clone()).encode());

        let st = StateTransition {
            nonce: transfer.nonce,
            gas_price: transfer.gas_price,
            gas_limit: transfer.gas_limit,
            recipient: transfer.recipient,
            amount: transfer.amount,
            payload: transfer.payload.clone(),
            sender: transfer.from,
            chain_epoch: chain.epoch,
            tx_hash,
            simulate: ctx.simulate,
        };

        let mut batch = StateBatch::new(&self.db);

        if !ctx.simulate {
            batch.prepare(tx_hash, self.tx_count);
            self.tx_count += 1;
        }

        let config = batch
            .chain_config()
            .map_err(HandlerError::Db)?
            .ok_or(HandlerError::ChainConfigNotFound)?;

        let execution = st.transition_db(&mut batch, &config)?;

        if !ctx.simulate {
            self.block_bloom.or_assign(&execution.bloom);
            batch.set_logs(tx_hash, execution.logs.clone());
        }

        let mut events = vec![
            Event::new(EVENT_TYPE_NATIVE).attr(ATTR_KEY_AMOUNT, transfer.amount.to_string()),
            Event::new(EVENT_TYPE_MESSAGE)
                .attr(ATTR_KEY_MODULE, MODULE_NAME)
                .attr(ATTR_KEY_SENDER, transfer.from.to_hex()),
        ];
        if let Some(recipient) = &transfer.recipient {
            events.push(
                Event::new(EVENT_TYPE_NATIVE).attr(ATTR_KEY_RECIPIENT, recipient.to_hex()),
            );
        }

        if !ctx.simulate {
            batch.commit().map_err(HandlerError::LogPersist)?;
        }

        info!(
            hash = %tx_hash,
            sender = %transfer.from,
            simulate = ctx.simulate,
            "native transfer executed"
        );

        Ok(TxResult {
            events,
            gas_used: execution.gas_used,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TX_GAS;
    use crate::crypto::keys::Keypair;
    use crate::state::store::AccountState;
    use crate::transaction::builder::TransactionBuilder;
    use crate::transaction::signing::sign_transaction;
    use crate::transaction::types::MintData;
    use crate::zk::primitives::zero_balance_commitment;
    use crate::zk::prover::TransferProver;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    const CHAIN: &str = "veil_9000-1";
    const EPOCH: u64 = 9000;

    fn setup() -> (Handler, TransferProver, Keypair) {
        let mut rng = StdRng::seed_from_u64(1);
        let (prover, verifier) = TransferProver::setup(&mut rng);
        let db = ChainDb::open_temporary().expect("temp db");
        db.set_chain_config(&ChainConfig::new(CHAIN)).unwrap();

        let keypair = Keypair::generate();
        db.put_account(&keypair.address(), &AccountState::with_balance(10_000_000))
            .unwrap();

        let mut handler = Handler::new(db, verifier);
        handler.begin_block(1);
        (handler, prover, keypair)
    }

    fn signed_mint(
        prover: &TransferProver,
        keypair: &Keypair,
        old_balance: &Hash,
        serial: Hash,
        commitment: Hash,
        value: u64,
        nonce: u64,
    ) -> Msg {
        let proof = prover
            .prove_mint(old_balance, &serial, &commitment, value)
            .unwrap();
        let mut tx = TransactionBuilder::new()
            .nonce(nonce)
            .gas_price(1)
            .mint(MintData {
                value,
                serial,
                commitment,
                proof: proof.to_bytes(),
            })
            .build();
        sign_transaction(&mut tx, keypair, EPOCH).unwrap();
        Msg::Extended(tx)
    }

    #[test]
    fn mint_from_fresh_account_is_accepted() {
        let (mut handler, prover, keypair) = setup();
        let new_cmt = keccak256(b"balance after mint");
        let msg = signed_mint(
            &prover,
            &keypair,
            &zero_balance_commitment(),
            initial_serial(),
            new_cmt,
            100,
            0,
        );

        let result = handler.handle(&Context::new(CHAIN), &msg).unwrap();
        assert_eq!(result.gas_used, TX_GAS);
        assert_eq!(
            handler.db().get_cmt_balance(&keypair.address()).unwrap(),
            Some(new_cmt)
        );
        assert_eq!(handler.tx_count(), 1);
    }

    #[test]
    fn missing_chain_config_is_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let (_, verifier) = TransferProver::setup(&mut rng);
        let db = ChainDb::open_temporary().unwrap(); // config never stored
        let mut handler = Handler::new(db, verifier);

        let mut tx = TransactionBuilder::new().build();
        let kp = Keypair::generate();
        sign_transaction(&mut tx, &kp, EPOCH).unwrap();

        assert!(matches!(
            handler.handle(&Context::new(CHAIN), &Msg::Extended(tx)),
            Err(HandlerError::ChainConfigNotFound)
        ));
    }

    #[test]
    fn malformed_chain_id_is_rejected() {
        let (mut handler, prover, keypair) = setup();
        let msg = signed_mint(
            &prover,
            &keypair,
            &zero_balance_commitment(),
            initial_serial(),
            keccak256(b"cmt"),
            5,
            0,
        );
        assert!(matches!(
            handler.handle(&Context::new("not-a-chain-id"), &msg),
            Err(HandlerError::ChainId(_))
        ));
    }

    #[test]
    fn unsigned_transaction_is_rejected() {
        let (mut handler, _, _) = setup();
        let tx = TransactionBuilder::new().build();
        assert!(matches!(
            handler.handle(&Context::new(CHAIN), &Msg::Extended(tx)),
            Err(HandlerError::InvalidSignature)
        ));
    }

    #[test]
    fn native_transfer_moves_public_value() {
        let (mut handler, _, keypair) = setup();
        let recipient = Address([9u8; 20]);
        let msg = Msg::Native(NativeTransfer {
            from: keypair.address(),
            nonce: 0,
            gas_price: 1,
            gas_limit: TX_GAS,
            recipient: Some(recipient),
            amount: 777,
            payload: vec![],
        });

        let result = handler.handle(&Context::new(CHAIN), &msg).unwrap();
        assert_eq!(result.events[0].event_type, EVENT_TYPE_NATIVE);
        assert_eq!(
            handler.db().get_account(&recipient).unwrap().unwrap().balance,
            777
        );
    }

    #[test]
    fn seal_block_records_root_and_bloom() {
        let (mut handler, prover, keypair) = setup();
        let new_cmt = keccak256(b"cmt");
        let msg = signed_mint(
            &prover,
            &keypair,
            &zero_balance_commitment(),
            initial_serial(),
            new_cmt,
            10,
            0,
        );
        handler.handle(&Context::new(CHAIN), &msg).unwrap();

        let (root, bloom) = handler.seal_block().unwrap();
        assert_eq!(root, merkle_root(&[new_cmt]));
        assert!(!bloom.is_zero());
        assert_eq!(handler.db().get_root(1).unwrap(), Some(root));
        assert_eq!(handler.db().get_block_bloom(1).unwrap(), Some(bloom));
    }
}
