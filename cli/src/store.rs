//! # SerialStore — the wallet's durable serial-number sidecar
//!
//! A wallet mid-flow holds state the chain does not: the serial it last
//! issued, the serial it will issue next, the serials it has already
//! spent, the one-time key a pending deposit is encrypted to, and which
//! stage of a confidential flow it is in. Losing that state on restart
//! would strand in-flight transfers, so it is persisted to a single
//! binary file and rewritten atomically on every change.
//!
//! This file is advisory to the wallet only. The chain never reads it;
//! consensus relies solely on the on-chain spent-serial set.
//!
//! ## On-disk format
//!
//! `<home>/SN` (default home: `$HOME/.veilcli`), bincode-encoded
//! [`SerialState`], file mode 0600. Rewrites go through a temp file in
//! the same directory followed by a rename, so a crash mid-write leaves
//! either the old state or the new one, never a torn file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use veil_protocol::crypto::hash::Hash;
use veil_protocol::crypto::keys::OneTimeKey;

/// File name of the sidecar within the wallet home directory.
const SIDECAR_FILE: &str = "SN";

/// Default wallet home directory name under `$HOME`.
const DEFAULT_HOME: &str = ".veilcli";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the sidecar.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt sidecar file: {0}")]
    Corrupt(String),

    #[error("no home directory available")]
    NoHome,
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Which step of a confidential flow the wallet is in.
///
/// The wallet advances the stage when it broadcasts a transaction and
/// returns to `Idle` once the transaction is observed on-chain, so a
/// restart can tell "waiting for inclusion" apart from "nothing pending".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Idle,
    MintSubmitted,
    SendSubmitted,
    DepositSubmitted,
    RedeemSubmitted,
    UpdateSubmitted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::MintSubmitted => "mint-submitted",
            Self::SendSubmitted => "send-submitted",
            Self::DepositSubmitted => "deposit-submitted",
            Self::RedeemSubmitted => "redeem-submitted",
            Self::UpdateSubmitted => "update-submitted",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// SerialState
// ---------------------------------------------------------------------------

/// Everything the sidecar persists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SerialState {
    /// The serial consumed by the in-flight transaction.
    pub sequence: Hash,
    /// The serial the wallet will consume next.
    pub sequence_after: Hash,
    /// Serials this wallet has spent (newest last).
    pub spent: Vec<Hash>,
    /// The one-time key of a pending incoming transfer, if any.
    pub one_time_key: Option<OneTimeKey>,
    /// Current flow stage.
    pub stage: Stage,
}

// ---------------------------------------------------------------------------
// SerialStore
// ---------------------------------------------------------------------------

/// Owning handle to the sidecar file.
///
/// Opened once per process and passed by reference to the commands that
/// need it; every mutation is written back immediately via
/// [`SerialStore::save`].
#[derive(Debug)]
pub struct SerialStore {
    path: PathBuf,
    state: SerialState,
}

impl SerialStore {
    /// Open the sidecar under the default home (`$HOME/.veilcli/SN`).
    pub fn open_default() -> Result<Self, SidecarError> {
        let home = dirs::home_dir().ok_or(SidecarError::NoHome)?;
        Self::open(&home.join(DEFAULT_HOME))
    }

    /// Open the sidecar under an explicit wallet home directory.
    ///
    /// A missing or empty file means a fresh wallet; nothing is created
    /// on disk until the first [`SerialStore::save`].
    pub fn open(home: &Path) -> Result<Self, SidecarError> {
        let path = home.join(SIDECAR_FILE);
        let state = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => SerialState::default(),
            Ok(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| SidecarError::Corrupt(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SerialState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, state })
    }

    /// The sidecar file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current persisted state.
    pub fn state(&self) -> &SerialState {
        &self.state
    }

    /// Record a broadcast: the consumed serial, its successor, and the
    /// stage the wallet is now in. Persists immediately.
    pub fn record_broadcast(
        &mut self,
        consumed: Hash,
        next: Hash,
        stage: Stage,
    ) -> Result<(), SidecarError> {
        self.state.sequence = consumed;
        self.state.sequence_after = next;
        if !self.state.spent.contains(&consumed) {
            self.state.spent.push(consumed);
        }
        self.state.stage = stage;
        self.save()
    }

    /// Record the one-time key of a pending incoming transfer.
    pub fn record_one_time_key(&mut self, key: OneTimeKey) -> Result<(), SidecarError> {
        self.state.one_time_key = Some(key);
        self.save()
    }

    /// Return to the idle stage (in-flight transaction confirmed).
    pub fn settle(&mut self) -> Result<(), SidecarError> {
        self.state.stage = Stage::Idle;
        self.state.one_time_key = None;
        self.save()
    }

    /// Wipe the sidecar back to the fresh-wallet state.
    pub fn reset(&mut self) -> Result<(), SidecarError> {
        self.state = SerialState::default();
        self.save()
    }

    /// Atomically rewrite the sidecar file.
    ///
    /// Writes a sibling temp file, restricts it to owner read/write, and
    /// renames it over the target.
    pub fn save(&self) -> Result<(), SidecarError> {
        let bytes = bincode::serialize(&self.state)
            .map_err(|e| SidecarError::Corrupt(e.to_string()))?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use veil_protocol::crypto::hash::keccak256;

    fn home() -> tempfile::TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    #[test]
    fn fresh_open_is_default_state() {
        let dir = home();
        let store = SerialStore::open(dir.path()).unwrap();
        assert_eq!(store.state(), &SerialState::default());
        assert!(!store.path().exists(), "opening must not create the file");
    }

    #[test]
    fn state_survives_reopen() {
        let dir = home();
        let sn = keccak256(b"sn-1");
        let next = keccak256(b"sn-2");

        let mut store = SerialStore::open(dir.path()).unwrap();
        store
            .record_broadcast(sn, next, Stage::SendSubmitted)
            .unwrap();
        drop(store);

        let reopened = SerialStore::open(dir.path()).unwrap();
        assert_eq!(reopened.state().sequence, sn);
        assert_eq!(reopened.state().sequence_after, next);
        assert_eq!(reopened.state().spent, vec![sn]);
        assert_eq!(reopened.state().stage, Stage::SendSubmitted);
    }

    #[test]
    fn record_broadcast_deduplicates_spent_serials() {
        let dir = home();
        let sn = keccak256(b"sn");
        let mut store = SerialStore::open(dir.path()).unwrap();
        store
            .record_broadcast(sn, keccak256(b"next"), Stage::MintSubmitted)
            .unwrap();
        store
            .record_broadcast(sn, keccak256(b"next"), Stage::MintSubmitted)
            .unwrap();
        assert_eq!(store.state().spent.len(), 1);
    }

    #[test]
    fn settle_returns_to_idle_and_clears_key() {
        let dir = home();
        let mut store = SerialStore::open(dir.path()).unwrap();
        store
            .record_one_time_key(OneTimeKey {
                x: [1u8; 32],
                y: [2u8; 32],
            })
            .unwrap();
        store
            .record_broadcast(
                keccak256(b"sn"),
                keccak256(b"next"),
                Stage::DepositSubmitted,
            )
            .unwrap();

        store.settle().unwrap();
        assert_eq!(store.state().stage, Stage::Idle);
        assert!(store.state().one_time_key.is_none());
        // The spent set is history, not flow state; it survives.
        assert_eq!(store.state().spent.len(), 1);
    }

    #[test]
    fn reset_wipes_everything() {
        let dir = home();
        let mut store = SerialStore::open(dir.path()).unwrap();
        store
            .record_broadcast(keccak256(b"sn"), keccak256(b"n"), Stage::MintSubmitted)
            .unwrap();
        store.reset().unwrap();
        assert_eq!(store.state(), &SerialState::default());

        let reopened = SerialStore::open(dir.path()).unwrap();
        assert_eq!(reopened.state(), &SerialState::default());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = home();
        let mut store = SerialStore::open(dir.path()).unwrap();
        store
            .record_broadcast(keccak256(b"sn"), keccak256(b"n"), Stage::MintSubmitted)
            .unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn sidecar_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = home();
        let mut store = SerialStore::open(dir.path()).unwrap();
        store
            .record_broadcast(keccak256(b"sn"), keccak256(b"n"), Stage::MintSubmitted)
            .unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_reported_not_swallowed() {
        let dir = home();
        std::fs::write(dir.path().join(SIDECAR_FILE), b"\xFF\xFF\xFF garbage").unwrap();
        assert!(matches!(
            SerialStore::open(dir.path()),
            Err(SidecarError::Corrupt(_))
        ));
    }
}
