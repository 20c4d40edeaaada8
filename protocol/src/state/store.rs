//! The per-transaction state overlay.
//!
//! The handler never writes to [`super::db::ChainDb`] directly. It stages
//! every mutation in a [`StateBatch`] — a read-through overlay that sees
//! its own pending writes — and only a successful, non-simulated
//! transaction commits the overlay. Dropping the batch (on any error, or
//! in check-tx simulation) leaves the database untouched, which is exactly
//! the atomicity the confidential operations require: a serial is marked
//! spent if and only if every other effect of its transaction landed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::ChainConfig;
use crate::crypto::hash::{Address, Hash};
use crate::zk::primitives::zero_balance_commitment;

use super::db::{ChainDb, DbResult, StateChanges};
use super::log::Log;

// ---------------------------------------------------------------------------
// AccountState
// ---------------------------------------------------------------------------

/// The public on-chain state of a single account.
///
/// Every field is consensus-critical. The hidden balance is *not* here —
/// it lives in the `cmt_balances` tree as an opaque commitment, keyed by
/// the same address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Next expected transaction nonce.
    pub nonce: u64,
    /// Public balance, in the smallest unit.
    pub balance: u128,
}

impl AccountState {
    /// An account with the given public balance and a zero nonce.
    pub fn with_balance(balance: u128) -> Self {
        Self { nonce: 0, balance }
    }
}

// ---------------------------------------------------------------------------
// StateBatch
// ---------------------------------------------------------------------------

/// Read-through write overlay for a single transaction.
///
/// Reads consult the overlay first and fall back to the database; writes
/// only touch the overlay. Ordered maps keep the eventual write sequence
/// identical on every node.
pub struct StateBatch<'a> {
    db: &'a ChainDb,
    accounts: BTreeMap<Address, AccountState>,
    cmt_balances: BTreeMap<Address, Hash>,
    spent_serials: BTreeSet<Hash>,
    new_commitments: Vec<Hash>,
    logs: BTreeMap<Hash, Vec<Log>>,
    /// Log-buffer context set by `prepare`: the transaction hash and its
    /// index within the block, stamped onto every log the execution emits.
    current_tx_hash: Hash,
    current_tx_index: u64,
}

impl<'a> StateBatch<'a> {
    /// A fresh, empty overlay over the given database.
    pub fn new(db: &'a ChainDb) -> Self {
        Self {
            db,
            accounts: BTreeMap::new(),
            cmt_balances: BTreeMap::new(),
            spent_serials: BTreeSet::new(),
            new_commitments: Vec::new(),
            logs: BTreeMap::new(),
            current_tx_hash: Hash::zero(),
            current_tx_index: 0,
        }
    }

    /// Prepare the log buffer for a transaction: its hash and block-local
    /// index. Skipped entirely in simulation, where the defaults are never
    /// observed because nothing commits.
    pub fn prepare(&mut self, tx_hash: Hash, tx_index: u64) {
        self.current_tx_hash = tx_hash;
        self.current_tx_index = tx_index;
    }

    /// The prepared `(tx_hash, tx_index)` pair for log stamping.
    pub fn tx_context(&self) -> (Hash, u64) {
        (self.current_tx_hash, self.current_tx_index)
    }

    // -- Accounts -----------------------------------------------------------

    /// The account state visible to this transaction (overlay, then
    /// database, then the default empty account).
    pub fn account(&self, address: &Address) -> DbResult<AccountState> {
        if let Some(state) = self.accounts.get(address) {
            return Ok(*state);
        }
        Ok(self.db.get_account(address)?.unwrap_or_default())
    }

    /// Stage an account update.
    pub fn set_account(&mut self, address: Address, state: AccountState) {
        self.accounts.insert(address, state);
    }

    // -- Hidden balances ----------------------------------------------------

    /// The hidden-balance commitment for an account; accounts that never
    /// used the confidential layer report the canonical zero-balance
    /// commitment.
    pub fn cmt_balance(&self, address: &Address) -> DbResult<Hash> {
        if let Some(commitment) = self.cmt_balances.get(address) {
            return Ok(*commitment);
        }
        Ok(self
            .db
            .get_cmt_balance(address)?
            .unwrap_or_else(zero_balance_commitment))
    }

    /// Stage a hidden-balance replacement.
    pub fn set_cmt_balance(&mut self, address: Address, commitment: Hash) {
        self.cmt_balances.insert(address, commitment);
    }

    // -- Spent serials ------------------------------------------------------

    /// Whether a serial is spent, as visible to this transaction (staged
    /// marks count — a serial reused within one block is caught here).
    pub fn is_serial_spent(&self, serial: &Hash) -> DbResult<bool> {
        if self.spent_serials.contains(serial) {
            return Ok(true);
        }
        self.db.is_serial_spent(serial)
    }

    /// Stage a serial as spent. Idempotent.
    pub fn mark_serial_spent(&mut self, serial: Hash) {
        self.spent_serials.insert(serial);
    }

    // -- Commitments --------------------------------------------------------

    /// Stage a commitment for appending to the tree.
    pub fn insert_commitment(&mut self, commitment: Hash) {
        self.new_commitments.push(commitment);
    }

    // -- Logs ---------------------------------------------------------------

    /// Stage the logs produced under a transaction hash.
    pub fn set_logs(&mut self, tx_hash: Hash, entries: Vec<Log>) {
        self.logs.insert(tx_hash, entries);
    }

    // -- Config -------------------------------------------------------------

    /// The deployment configuration (never staged; config changes are a
    /// genesis-level operation, not a transaction effect).
    pub fn chain_config(&self) -> DbResult<Option<ChainConfig>> {
        self.db.get_chain_config()
    }

    // -- Commit -------------------------------------------------------------

    /// Whether the overlay holds any staged change.
    pub fn is_dirty(&self) -> bool {
        !(self.accounts.is_empty()
            && self.cmt_balances.is_empty()
            && self.spent_serials.is_empty()
            && self.new_commitments.is_empty()
            && self.logs.is_empty())
    }

    /// Apply every staged change to the database as a unit.
    ///
    /// Consumes the batch; an error means the database may hold none or
    /// part of the per-tree batches, which the handler treats as fatal to
    /// block execution rather than something to retry.
    pub fn commit(self) -> DbResult<()> {
        let changes = StateChanges {
            accounts: self.accounts.into_iter().collect(),
            cmt_balances: self.cmt_balances.into_iter().collect(),
            spent_serials: self.spent_serials.into_iter().collect(),
            commitments: self.new_commitments,
            logs: self.logs.into_iter().collect(),
        };
        self.db.apply_changes(&changes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    fn db() -> ChainDb {
        ChainDb::open_temporary().expect("temp db")
    }

    #[test]
    fn fresh_account_reads_default() {
        let db = db();
        let batch = StateBatch::new(&db);
        let state = batch.account(&Address([1u8; 20])).unwrap();
        assert_eq!(state, AccountState::default());
    }

    #[test]
    fn fresh_cmt_balance_is_zero_commitment() {
        let db = db();
        let batch = StateBatch::new(&db);
        assert_eq!(
            batch.cmt_balance(&Address([1u8; 20])).unwrap(),
            zero_balance_commitment()
        );
    }

    #[test]
    fn overlay_reads_its_own_writes() {
        let db = db();
        let mut batch = StateBatch::new(&db);
        let addr = Address([2u8; 20]);
        let cmt = keccak256(b"cmt");

        batch.set_account(addr, AccountState::with_balance(50));
        batch.set_cmt_balance(addr, cmt);
        batch.mark_serial_spent(keccak256(b"sn"));

        assert_eq!(batch.account(&addr).unwrap().balance, 50);
        assert_eq!(batch.cmt_balance(&addr).unwrap(), cmt);
        assert!(batch.is_serial_spent(&keccak256(b"sn")).unwrap());

        // Nothing has reached the database yet.
        assert!(db.get_account(&addr).unwrap().is_none());
        assert!(!db.is_serial_spent(&keccak256(b"sn")).unwrap());
    }

    #[test]
    fn dropping_a_batch_discards_everything() {
        let db = db();
        {
            let mut batch = StateBatch::new(&db);
            batch.set_account(Address([3u8; 20]), AccountState::with_balance(9));
            batch.mark_serial_spent(keccak256(b"sn"));
            batch.insert_commitment(keccak256(b"cmt"));
            // dropped here
        }
        assert!(db.get_account(&Address([3u8; 20])).unwrap().is_none());
        assert!(!db.is_serial_spent(&keccak256(b"sn")).unwrap());
        assert_eq!(db.commitment_count().unwrap(), 0);
    }

    #[test]
    fn commit_persists_everything() {
        let db = db();
        let addr = Address([4u8; 20]);
        let serial = keccak256(b"sn");
        let cmt = keccak256(b"cmt");
        let tx_hash = keccak256(b"tx");

        let mut batch = StateBatch::new(&db);
        batch.prepare(tx_hash, 0);
        batch.set_account(addr, AccountState::with_balance(123));
        batch.set_cmt_balance(addr, cmt);
        batch.mark_serial_spent(serial);
        batch.insert_commitment(cmt);
        batch.set_logs(tx_hash, vec![]);
        batch.commit().unwrap();

        assert_eq!(db.get_account(&addr).unwrap().unwrap().balance, 123);
        assert_eq!(db.get_cmt_balance(&addr).unwrap(), Some(cmt));
        assert!(db.is_serial_spent(&serial).unwrap());
        assert_eq!(db.all_commitments().unwrap(), vec![cmt]);
        assert!(db.get_logs(&tx_hash).unwrap().is_some());
    }

    #[test]
    fn staged_serial_is_visible_before_commit() {
        // The in-block double-spend check relies on this.
        let db = db();
        let mut batch = StateBatch::new(&db);
        let serial = keccak256(b"sn");

        assert!(!batch.is_serial_spent(&serial).unwrap());
        batch.mark_serial_spent(serial);
        assert!(batch.is_serial_spent(&serial).unwrap());
    }

    #[test]
    fn dirty_tracking() {
        let db = db();
        let mut batch = StateBatch::new(&db);
        assert!(!batch.is_dirty());
        batch.mark_serial_spent(keccak256(b"sn"));
        assert!(batch.is_dirty());
    }
}
