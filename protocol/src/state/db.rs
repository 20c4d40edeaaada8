//! # ChainDb — Persistent Storage Engine
//!
//! The persistence layer for the confidential-value core, built on sled's
//! embedded key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees", each an independent keyspace:
//!
//! | Tree            | Key                  | Value                     |
//! |-----------------|----------------------|---------------------------|
//! | `accounts`      | address (20B)        | `bincode(AccountState)`   |
//! | `cmt_balances`  | address (20B)        | hidden-balance hash (32B) |
//! | `spent_serials` | serial (32B)         | `0x01`                    |
//! | `commitments`   | index (8B BE)        | commitment hash (32B)     |
//! | `roots`         | height (8B BE)       | tree root (32B)           |
//! | `blooms`        | height (8B BE)       | block bloom (256B)        |
//! | `logs`          | tx hash (32B)        | `bincode(Vec<Log>)`       |
//! | `metadata`      | key (UTF-8)          | value (bytes)             |
//!
//! Commitment indices and heights are big-endian so sled's lexicographic
//! ordering matches numeric ordering — iterating `commitments` yields the
//! exact insertion sequence the Merkle root is defined over.
//!
//! Spent serials get their own tree rather than piggybacking on the
//! account namespace: the "is this serial spent" witness is one key probe,
//! and serial entries never collide with real accounts.
//!
//! ## Atomicity
//!
//! Handlers never write here directly — they stage changes in a
//! [`super::store::StateBatch`] and commit through
//! [`ChainDb::apply_changes`], which applies one sled `Batch` per tree in
//! a fixed order and flushes at the end.

use sled::{Batch, Db, Tree};
use std::path::Path;

use crate::config::ChainConfig;
use crate::crypto::hash::{Address, Hash};

use super::log::{Bloom, Log};
use super::store::AccountState;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt entry under key {0}")]
    Corrupt(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Number of commitments appended so far (8B BE).
const META_COMMITMENT_COUNT: &[u8] = b"commitment_count";

/// The deployment's `ChainConfig`, bincode-encoded.
const META_CHAIN_CONFIG: &[u8] = b"chain_config";

// ---------------------------------------------------------------------------
// Staged changes
// ---------------------------------------------------------------------------

/// The flattened output of a [`super::store::StateBatch`], ready to apply.
///
/// Entries are pre-sorted by the batch so the write order is identical on
/// every node.
#[derive(Debug, Default)]
pub struct StateChanges {
    pub accounts: Vec<(Address, AccountState)>,
    pub cmt_balances: Vec<(Address, Hash)>,
    pub spent_serials: Vec<Hash>,
    pub commitments: Vec<Hash>,
    pub logs: Vec<(Hash, Vec<Log>)>,
}

// ---------------------------------------------------------------------------
// ChainDb
// ---------------------------------------------------------------------------

/// Persistent storage engine for the confidential-value core.
///
/// Wraps a sled `Db` and exposes typed accessors per tree. sled trees are
/// lock-free for concurrent reads and serialize writes internally, so
/// `ChainDb` clones can be shared freely; the consensus thread is the only
/// writer by construction.
#[derive(Debug, Clone)]
pub struct ChainDb {
    db: Db,
    accounts: Tree,
    cmt_balances: Tree,
    spent_serials: Tree,
    commitments: Tree,
    roots: Tree,
    blooms: Tree,
    logs: Tree,
    metadata: Tree,
}

impl ChainDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database cleaned up on drop. Ideal for tests —
    /// no filesystem residue, no cleanup.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let accounts = db.open_tree("accounts")?;
        let cmt_balances = db.open_tree("cmt_balances")?;
        let spent_serials = db.open_tree("spent_serials")?;
        let commitments = db.open_tree("commitments")?;
        let roots = db.open_tree("roots")?;
        let blooms = db.open_tree("blooms")?;
        let logs = db.open_tree("logs")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            accounts,
            cmt_balances,
            spent_serials,
            commitments,
            roots,
            blooms,
            logs,
            metadata,
        })
    }

    // -- Accounts -----------------------------------------------------------

    /// Retrieve the public state of an account, if it has ever been written.
    pub fn get_account(&self, address: &Address) -> DbResult<Option<AccountState>> {
        match self.accounts.get(address.as_bytes())? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .map_err(|_| DbError::Corrupt(address.to_hex()))?,
            )),
            None => Ok(None),
        }
    }

    /// Write an account state directly (genesis seeding and tests; normal
    /// execution goes through [`ChainDb::apply_changes`]).
    pub fn put_account(&self, address: &Address, state: &AccountState) -> DbResult<()> {
        let bytes =
            bincode::serialize(state).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.accounts.insert(address.as_bytes(), bytes)?;
        Ok(())
    }

    // -- Hidden balances ----------------------------------------------------

    /// The stored hidden-balance commitment for an account, if any.
    pub fn get_cmt_balance(&self, address: &Address) -> DbResult<Option<Hash>> {
        match self.cmt_balances.get(address.as_bytes())? {
            Some(bytes) => Hash::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| DbError::Corrupt(address.to_hex())),
            None => Ok(None),
        }
    }

    // -- Spent serials ------------------------------------------------------

    /// Whether a serial number has been recorded as spent.
    pub fn is_serial_spent(&self, serial: &Hash) -> DbResult<bool> {
        Ok(self.spent_serials.contains_key(serial.as_bytes())?)
    }

    /// Number of spent serials on record (diagnostics and tests).
    pub fn spent_serial_count(&self) -> usize {
        self.spent_serials.len()
    }

    // -- Commitment tree ----------------------------------------------------

    /// Number of commitments appended so far.
    pub fn commitment_count(&self) -> DbResult<u64> {
        match self.metadata.get(META_COMMITMENT_COUNT)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| DbError::Corrupt("commitment_count".into()))?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// All commitments in insertion order — the leaf sequence the current
    /// tree root is computed over.
    pub fn all_commitments(&self) -> DbResult<Vec<Hash>> {
        let mut out = Vec::with_capacity(self.commitments.len());
        for entry in self.commitments.iter() {
            let (key, value) = entry?;
            let hash = Hash::from_slice(&value)
                .ok_or_else(|| DbError::Corrupt(hex::encode(&key)))?;
            out.push(hash);
        }
        Ok(out)
    }

    /// The sealed commitment-tree root at a block height, if recorded.
    pub fn get_root(&self, height: u64) -> DbResult<Option<Hash>> {
        match self.roots.get(height.to_be_bytes())? {
            Some(bytes) => Hash::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| DbError::Corrupt(format!("root@{height}"))),
            None => Ok(None),
        }
    }

    /// Record the sealed root for a block height.
    pub fn put_root(&self, height: u64, root: &Hash) -> DbResult<()> {
        self.roots.insert(height.to_be_bytes(), root.as_bytes())?;
        Ok(())
    }

    // -- Blooms -------------------------------------------------------------

    /// The folded block bloom at a height, if recorded.
    pub fn get_block_bloom(&self, height: u64) -> DbResult<Option<Bloom>> {
        match self.blooms.get(height.to_be_bytes())? {
            Some(bytes) => Bloom::from_bytes(&bytes)
                .map(Some)
                .ok_or_else(|| DbError::Corrupt(format!("bloom@{height}"))),
            None => Ok(None),
        }
    }

    /// Record the folded block bloom for a height.
    pub fn put_block_bloom(&self, height: u64, bloom: &Bloom) -> DbResult<()> {
        self.blooms
            .insert(height.to_be_bytes(), bloom.as_bytes().as_slice())?;
        Ok(())
    }

    // -- Logs ---------------------------------------------------------------

    /// The logs persisted under a transaction hash.
    pub fn get_logs(&self, tx_hash: &Hash) -> DbResult<Option<Vec<Log>>> {
        match self.logs.get(tx_hash.as_bytes())? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|_| DbError::Corrupt(tx_hash.to_hex()))?,
            )),
            None => Ok(None),
        }
    }

    // -- Chain config -------------------------------------------------------

    /// The deployment configuration, if one has been stored.
    pub fn get_chain_config(&self) -> DbResult<Option<ChainConfig>> {
        match self.metadata.get(META_CHAIN_CONFIG)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes)
                    .map_err(|_| DbError::Corrupt("chain_config".into()))?,
            )),
            None => Ok(None),
        }
    }

    /// Store the deployment configuration (genesis-time operation).
    pub fn set_chain_config(&self, config: &ChainConfig) -> DbResult<()> {
        let bytes =
            bincode::serialize(config).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.metadata.insert(META_CHAIN_CONFIG, bytes)?;
        Ok(())
    }

    // -- Batch application --------------------------------------------------

    /// Apply a transaction's staged changes: one sled `Batch` per touched
    /// tree, in fixed tree order, then flush. Callers guarantee entries
    /// arrive pre-sorted so every node writes identically.
    pub fn apply_changes(&self, changes: &StateChanges) -> DbResult<()> {
        if !changes.accounts.is_empty() {
            let mut batch = Batch::default();
            for (address, state) in &changes.accounts {
                let bytes = bincode::serialize(state)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                batch.insert(address.as_bytes().as_slice(), bytes);
            }
            self.accounts.apply_batch(batch)?;
        }

        if !changes.cmt_balances.is_empty() {
            let mut batch = Batch::default();
            for (address, commitment) in &changes.cmt_balances {
                batch.insert(address.as_bytes().as_slice(), commitment.as_bytes().as_slice());
            }
            self.cmt_balances.apply_batch(batch)?;
        }

        if !changes.spent_serials.is_empty() {
            let mut batch = Batch::default();
            for serial in &changes.spent_serials {
                batch.insert(serial.as_bytes().as_slice(), &[0x01][..]);
            }
            self.spent_serials.apply_batch(batch)?;
        }

        if !changes.commitments.is_empty() {
            let mut next = self.commitment_count()?;
            let mut batch = Batch::default();
            for commitment in &changes.commitments {
                batch.insert(&next.to_be_bytes(), commitment.as_bytes().as_slice());
                next += 1;
            }
            self.commitments.apply_batch(batch)?;
            self.metadata
                .insert(META_COMMITMENT_COUNT, &next.to_be_bytes())?;
        }

        if !changes.logs.is_empty() {
            let mut batch = Batch::default();
            for (tx_hash, entries) in &changes.logs {
                let bytes = bincode::serialize(entries)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                batch.insert(tx_hash.as_bytes().as_slice(), bytes);
            }
            self.logs.apply_batch(batch)?;
        }

        self.db.flush()?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
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
    fn missing_account_is_none() {
        assert!(db().get_account(&Address([1u8; 20])).unwrap().is_none());
    }

    #[test]
    fn account_round_trip() {
        let db = db();
        let addr = Address([2u8; 20]);
        let state = AccountState {
            nonce: 4,
            balance: 1_000,
        };
        db.put_account(&addr, &state).unwrap();
        assert_eq!(db.get_account(&addr).unwrap(), Some(state));
    }

    #[test]
    fn chain_config_round_trip() {
        let db = db();
        assert!(db.get_chain_config().unwrap().is_none());
        let config = ChainConfig::new("veil_9000-1").with_update_enabled();
        db.set_chain_config(&config).unwrap();
        assert_eq!(db.get_chain_config().unwrap(), Some(config));
    }

    #[test]
    fn apply_changes_writes_every_tree() {
        let db = db();
        let addr = Address([3u8; 20]);
        let serial = keccak256(b"sn");
        let cmt = keccak256(b"cmt");
        let tx_hash = keccak256(b"tx");

        let changes = StateChanges {
            accounts: vec![(
                addr,
                AccountState {
                    nonce: 1,
                    balance: 7,
                },
            )],
            cmt_balances: vec![(addr, cmt)],
            spent_serials: vec![serial],
            commitments: vec![cmt],
            logs: vec![(tx_hash, vec![])],
        };
        db.apply_changes(&changes).unwrap();

        assert_eq!(db.get_account(&addr).unwrap().unwrap().nonce, 1);
        assert_eq!(db.get_cmt_balance(&addr).unwrap(), Some(cmt));
        assert!(db.is_serial_spent(&serial).unwrap());
        assert_eq!(db.commitment_count().unwrap(), 1);
        assert_eq!(db.all_commitments().unwrap(), vec![cmt]);
        assert_eq!(db.get_logs(&tx_hash).unwrap(), Some(vec![]));
    }

    #[test]
    fn commitments_preserve_insertion_order() {
        let db = db();
        let first = keccak256(b"first");
        let second = keccak256(b"second");

        db.apply_changes(&StateChanges {
            commitments: vec![first],
            ..Default::default()
        })
        .unwrap();
        db.apply_changes(&StateChanges {
            commitments: vec![second],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(db.all_commitments().unwrap(), vec![first, second]);
        assert_eq!(db.commitment_count().unwrap(), 2);
    }

    #[test]
    fn roots_and_blooms_round_trip() {
        let db = db();
        let root = keccak256(b"root");
        let mut bloom = Bloom::zero();
        bloom.accrue(b"entry");

        db.put_root(5, &root).unwrap();
        db.put_block_bloom(5, &bloom).unwrap();

        assert_eq!(db.get_root(5).unwrap(), Some(root));
        assert_eq!(db.get_root(6).unwrap(), None);
        assert_eq!(db.get_block_bloom(5).unwrap(), Some(bloom));
    }

    #[test]
    fn spent_serial_marking_is_idempotent() {
        let db = db();
        let serial = keccak256(b"sn");
        for _ in 0..2 {
            db.apply_changes(&StateChanges {
                spent_serials: vec![serial],
                ..Default::default()
            })
            .unwrap();
        }
        assert!(db.is_serial_spent(&serial).unwrap());
        assert_eq!(db.spent_serial_count(), 1);
    }
}
