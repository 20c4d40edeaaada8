//! Core transaction types.
//!
//! The operation a transaction performs is a closed sum, [`TxKind`], with
//! the confidential fields each operation requires living *inside* its
//! variant. A Mint carrying a transfer commitment, or a Deposit without a
//! one-time key, is not a validation failure — it is unrepresentable.
//! The wire decoder is the only place the flat field layout exists, and it
//! rejects illegal combinations before a [`Transaction`] is ever built.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::hash::{Address, Hash};
use crate::crypto::keys::{OneTimeKey, RecoverableSignature};

// ---------------------------------------------------------------------------
// Wire discriminants
// ---------------------------------------------------------------------------

/// Wire code for each transaction kind (the `code` field of the canonical
/// encoding).
pub const CODE_PUBLIC: u8 = 0x00;
pub const CODE_MINT: u8 = 0x01;
pub const CODE_SEND: u8 = 0x02;
pub const CODE_DEPOSIT: u8 = 0x03;
pub const CODE_UPDATE: u8 = 0x04;
pub const CODE_REDEEM: u8 = 0x05;

// ---------------------------------------------------------------------------
// Per-kind payloads
// ---------------------------------------------------------------------------

/// Mint: credit the hidden balance from the cleartext `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintData {
    /// Cleartext amount moved into hiding.
    pub value: u64,
    /// Serial of the prior hidden state (`SN₀` for a fresh account).
    pub serial: Hash,
    /// The new hidden-balance commitment.
    pub commitment: Hash,
    /// Groth16 proof for the mint statement.
    pub proof: Vec<u8>,
}

/// Send: debit the hidden balance into a transfer commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendData {
    /// Serial of the prior hidden state.
    pub serial: Hash,
    /// The new (post-debit) hidden-balance commitment.
    pub commitment: Hash,
    /// The transfer commitment the recipient will later claim.
    pub transfer_commitment: Hash,
    /// Groth16 proof for the send statement.
    pub proof: Vec<u8>,
    /// Note randomization counter, used by the recipient's wallet when
    /// scanning. Not validated by consensus.
    pub note_nonce: u64,
    /// Addressee hint for wallet scanning. Not validated by consensus.
    pub note_recipient: Option<Address>,
    /// Encrypted note payload for the recipient. Opaque to the chain.
    pub note_ciphertext: Vec<u8>,
}

/// Deposit: claim a transfer commitment with a one-time-key proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositData {
    /// Serial of the prior hidden state of the claiming account.
    pub serial: Hash,
    /// The sender-side serial of the claimed transfer commitment.
    pub sender_serial: Hash,
    /// The new (post-credit) hidden-balance commitment.
    pub commitment: Hash,
    /// The commitment-tree root the membership proof is anchored to.
    pub root: Hash,
    /// Block heights whose commitments reconstruct the tree for `root`.
    pub commitment_blocks: Vec<u64>,
    /// The randomized one-time public key the transfer was encrypted to.
    pub one_time_key: OneTimeKey,
    /// Groth16 proof for the deposit statement.
    pub proof: Vec<u8>,
    /// Auxiliary signature made with the one-time key; must recover to
    /// `pubkey_to_address(one_time_key)`. `None` until attached.
    pub signature: Option<RecoverableSignature>,
}

/// Redeem: debit the hidden balance into the cleartext `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemData {
    /// Cleartext amount moved out of hiding.
    pub value: u64,
    /// Serial of the prior hidden state.
    pub serial: Hash,
    /// The new hidden-balance commitment.
    pub commitment: Hash,
    /// Groth16 proof for the redeem statement.
    pub proof: Vec<u8>,
}

/// Update: re-randomize the hidden balance against a current tree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateData {
    /// Serial of the prior hidden state.
    pub serial: Hash,
    /// The re-randomized hidden-balance commitment.
    pub commitment: Hash,
    /// The commitment-tree root the proof is anchored to.
    pub root: Hash,
    /// Block heights whose commitments reconstruct the tree for `root`.
    pub commitment_blocks: Vec<u64>,
    /// Groth16 proof for the update statement.
    pub proof: Vec<u8>,
}

// ---------------------------------------------------------------------------
// TxKind
// ---------------------------------------------------------------------------

/// The operation a transaction performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    /// Ordinary public transaction; no confidential fields at all.
    Public,
    Mint(MintData),
    Send(SendData),
    Deposit(DepositData),
    Redeem(RedeemData),
    Update(UpdateData),
}

impl TxKind {
    /// The wire discriminant byte.
    pub fn code(&self) -> u8 {
        match self {
            Self::Public => CODE_PUBLIC,
            Self::Mint(_) => CODE_MINT,
            Self::Send(_) => CODE_SEND,
            Self::Deposit(_) => CODE_DEPOSIT,
            Self::Update(_) => CODE_UPDATE,
            Self::Redeem(_) => CODE_REDEEM,
        }
    }

    /// Short name for logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Mint(_) => "mint",
            Self::Send(_) => "send",
            Self::Deposit(_) => "deposit",
            Self::Update(_) => "update",
            Self::Redeem(_) => "redeem",
        }
    }

    /// `true` for every kind except `Public`.
    pub fn is_confidential(&self) -> bool {
        !matches!(self, Self::Public)
    }

    /// The serial number consumed by this transaction, if any.
    pub fn serial(&self) -> Option<&Hash> {
        match self {
            Self::Public => None,
            Self::Mint(d) => Some(&d.serial),
            Self::Send(d) => Some(&d.serial),
            Self::Deposit(d) => Some(&d.serial),
            Self::Update(d) => Some(&d.serial),
            Self::Redeem(d) => Some(&d.serial),
        }
    }

    /// The new hidden-balance commitment this transaction installs, if any.
    pub fn commitment(&self) -> Option<&Hash> {
        match self {
            Self::Public => None,
            Self::Mint(d) => Some(&d.commitment),
            Self::Send(d) => Some(&d.commitment),
            Self::Deposit(d) => Some(&d.commitment),
            Self::Update(d) => Some(&d.commitment),
            Self::Redeem(d) => Some(&d.commitment),
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// The extended transaction record.
///
/// Carries the ordinary public fields (nonce, gas, recipient, amount,
/// payload) for every kind, plus the confidential payload inside
/// [`TxKind`]. Immutable once signed; referenced everywhere by the
/// Keccak-256 of its canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Per-sender sequence number.
    pub nonce: u64,
    /// Offered gas price, in the smallest fee unit.
    pub gas_price: u128,
    /// Gas ceiling for execution.
    pub gas_limit: u64,
    /// Destination account; `None` means contract creation.
    pub recipient: Option<Address>,
    /// Public transfer amount.
    pub amount: u128,
    /// Opaque call data for the public execution pipeline.
    pub payload: Vec<u8>,
    /// The operation and its confidential payload.
    pub kind: TxKind,
    /// Sender signature over the sighash; `None` for unsigned drafts.
    pub signature: Option<RecoverableSignature>,
}

impl Transaction {
    /// Returns `true` if the transaction carries a sender signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

// ---------------------------------------------------------------------------
// NativeTransfer
// ---------------------------------------------------------------------------

/// A chain-native public transfer message.
///
/// Unlike [`Transaction`], the sender is carried explicitly: the enclosing
/// envelope has already authenticated it before the handler runs, so there
/// is no signature to recover here. Native messages never carry
/// confidential fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransfer {
    /// The authenticated sender.
    pub from: Address,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub recipient: Option<Address>,
    pub amount: u128,
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Msg
// ---------------------------------------------------------------------------

/// The closed set of messages the handler accepts.
///
/// Anything else on the wire fails decoding with
/// [`super::encoding::DecodeError::UnknownMessageType`] — there is no
/// runtime "unrecognized message" path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// An extended (confidential-capable) transaction.
    Extended(Transaction),
    /// A chain-native public transfer.
    Native(NativeTransfer),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn mint_kind() -> TxKind {
        TxKind::Mint(MintData {
            value: 5,
            serial: Hash::zero(),
            commitment: Hash::zero(),
            proof: vec![1, 2, 3],
        })
    }

    #[test]
    fn kind_codes_match_wire_constants() {
        assert_eq!(TxKind::Public.code(), 0x00);
        assert_eq!(mint_kind().code(), 0x01);
    }

    #[test]
    fn kind_display_uses_names() {
        assert_eq!(TxKind::Public.to_string(), "public");
        assert_eq!(mint_kind().to_string(), "mint");
    }

    #[test]
    fn public_kind_has_no_confidential_accessors() {
        assert!(!TxKind::Public.is_confidential());
        assert!(TxKind::Public.serial().is_none());
        assert!(TxKind::Public.commitment().is_none());
    }

    #[test]
    fn confidential_kinds_expose_serial_and_commitment() {
        let kind = mint_kind();
        assert!(kind.is_confidential());
        assert!(kind.serial().is_some());
        assert!(kind.commitment().is_some());
    }

    #[test]
    fn transaction_serde_round_trip() {
        let tx = Transaction {
            nonce: 1,
            gas_price: 20,
            gas_limit: 21_000,
            recipient: Some(Address([9u8; 20])),
            amount: 1_000,
            payload: vec![0xAB],
            kind: mint_kind(),
            signature: None,
        };
        let json = serde_json::to_string(&tx).unwrap();
        let recovered: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, recovered);
    }
}
