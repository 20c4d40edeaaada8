//! Canonical binary encoding.
//!
//! The consensus-critical wire form: a flat, length-prefixed, field-ordered
//! layout shared by hashing, signing, and transport. serde is deliberately
//! not involved — field order and byte-level canonicality must never depend
//! on a derive.
//!
//! ## Layout
//!
//! Every field is a `u32` big-endian length prefix followed by that many
//! bytes, in this fixed order:
//!
//! ```text
//! nonce, gasPrice, gasLimit, recipient?, amount, payload,
//! v, r, s,
//! code, zkValue, SN?, SNS?, zkNonce, zkAddress?, CMT?, CMTS?,
//! proof, RT?, cmtBlockList, aux, X?, Y?, depV?, depR?, depS?
//! ```
//!
//! Optional fields encode as the empty payload when absent. Fixed-width
//! integers (`nonce`, `gasLimit`, `zkValue`, `zkNonce`) are 8-byte
//! big-endian. Big integers (`gasPrice`, `amount`, `v`, `depV`) are an
//! explicit sign byte (`0x00`; the protocol has no negative quantities)
//! followed by the minimal big-endian magnitude.
//!
//! ## Totality
//!
//! Decoding is total over the closed [`TxKind`] sum: an unknown `code`
//! byte, a missing required field, or a field a kind must not carry is a
//! [`DecodeError`], never a silently-accepted transaction. The sighash
//! variant of the encoding replaces `v` with the chain epoch and empties
//! `r`/`s`, which is how the epoch is folded into what gets signed.

use thiserror::Error;

use crate::config::MAX_PROOF_BYTES;
use crate::crypto::hash::{Address, Hash};
use crate::crypto::keys::RecoverableSignature;

use super::types::{
    DepositData, MintData, Msg, NativeTransfer, RedeemData, SendData, Transaction, TxKind,
    UpdateData, CODE_DEPOSIT, CODE_MINT, CODE_PUBLIC, CODE_REDEEM, CODE_SEND, CODE_UPDATE,
};
use crate::crypto::keys::OneTimeKey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while decoding the canonical form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated input")]
    Truncated,

    #[error("trailing bytes after message")]
    TrailingBytes,

    #[error("unknown transaction kind 0x{0:02x}")]
    UnknownTxKind(u8),

    #[error("unknown message type 0x{0:02x}")]
    UnknownMessageType(u8),

    #[error("{kind} transaction missing required field {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("{kind} transaction carries forbidden field {field}")]
    UnexpectedField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("field {field} has invalid length {len}")]
    InvalidLength { field: &'static str, len: usize },

    #[error("proof blob of {len} bytes exceeds the {max} byte ceiling")]
    ProofTooLarge { len: usize, max: usize },

    #[error("malformed integer field {0}")]
    MalformedInteger(&'static str),

    #[error("malformed signature fields")]
    MalformedSignature,
}

// ---------------------------------------------------------------------------
// Writer primitives
// ---------------------------------------------------------------------------

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    put_bytes(buf, &v.to_be_bytes());
}

/// Sign byte plus minimal big-endian magnitude; zero is just the sign byte.
fn uint_bytes(v: u128) -> Vec<u8> {
    let be = v.to_be_bytes();
    let start = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    let mut out = Vec::with_capacity(1 + be.len() - start);
    out.push(0x00);
    out.extend_from_slice(&be[start..]);
    out
}

fn put_uint(buf: &mut Vec<u8>, v: u128) {
    put_bytes(buf, &uint_bytes(v));
}

fn put_opt_hash(buf: &mut Vec<u8>, h: Option<&Hash>) {
    match h {
        Some(h) => put_bytes(buf, h.as_bytes()),
        None => put_bytes(buf, &[]),
    }
}

fn put_opt_addr(buf: &mut Vec<u8>, a: Option<&Address>) {
    match a {
        Some(a) => put_bytes(buf, a.as_bytes()),
        None => put_bytes(buf, &[]),
    }
}

fn put_u64_list(buf: &mut Vec<u8>, vals: &[u64]) {
    let mut packed = Vec::with_capacity(vals.len() * 8);
    for v in vals {
        packed.extend_from_slice(&v.to_be_bytes());
    }
    put_bytes(buf, &packed);
}

// ---------------------------------------------------------------------------
// Reader primitives
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take_field(&mut self) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < 4 {
            return Err(DecodeError::Truncated);
        }
        let len = u32::from_be_bytes(self.data[..4].try_into().unwrap()) as usize;
        self.data = &self.data[4..];
        if self.data.len() < len {
            return Err(DecodeError::Truncated);
        }
        let (field, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(field)
    }

    fn take_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let bytes = self.take_field()?;
        let arr: [u8; 8] = bytes.try_into().map_err(|_| DecodeError::InvalidLength {
            field,
            len: bytes.len(),
        })?;
        Ok(u64::from_be_bytes(arr))
    }

    /// Sign-byte big integer. Empty payload means "absent".
    fn take_opt_uint(&mut self, field: &'static str) -> Result<Option<u128>, DecodeError> {
        let bytes = self.take_field()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes[0] != 0x00 {
            return Err(DecodeError::MalformedInteger(field));
        }
        let magnitude = &bytes[1..];
        if magnitude.len() > 16 {
            return Err(DecodeError::MalformedInteger(field));
        }
        if magnitude.first() == Some(&0x00) {
            // Non-minimal encodings would make the canonical form ambiguous.
            return Err(DecodeError::MalformedInteger(field));
        }
        let mut out = [0u8; 16];
        out[16 - magnitude.len()..].copy_from_slice(magnitude);
        Ok(Some(u128::from_be_bytes(out)))
    }

    fn take_uint(&mut self, field: &'static str) -> Result<u128, DecodeError> {
        self.take_opt_uint(field)?
            .ok_or(DecodeError::MalformedInteger(field))
    }

    fn take_opt_hash(&mut self, field: &'static str) -> Result<Option<Hash>, DecodeError> {
        let bytes = self.take_field()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Hash::from_slice(bytes)
            .map(Some)
            .ok_or(DecodeError::InvalidLength {
                field,
                len: bytes.len(),
            })
    }

    fn take_opt_addr(&mut self, field: &'static str) -> Result<Option<Address>, DecodeError> {
        let bytes = self.take_field()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Address::from_slice(bytes)
            .map(Some)
            .ok_or(DecodeError::InvalidLength {
                field,
                len: bytes.len(),
            })
    }

    fn take_opt_word(&mut self, field: &'static str) -> Result<Option<[u8; 32]>, DecodeError> {
        Ok(self.take_opt_hash(field)?.map(|h| h.0))
    }

    fn take_u64_list(&mut self, field: &'static str) -> Result<Vec<u64>, DecodeError> {
        let bytes = self.take_field()?;
        if bytes.len() % 8 != 0 {
            return Err(DecodeError::InvalidLength {
                field,
                len: bytes.len(),
            });
        }
        Ok(bytes
            .chunks_exact(8)
            .map(|c| u64::from_be_bytes(c.try_into().unwrap()))
            .collect())
    }

    fn finish(self) -> Result<(), DecodeError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes)
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// How the signature slots are filled.
enum SigSlots {
    /// The transaction's own `{v, r, s}` (zero/empty when unsigned).
    Actual,
    /// Sighash form: `v` carries the chain epoch, `r`/`s` are empty.
    Sighash { epoch: u64 },
}

fn encode_inner(tx: &Transaction, slots: SigSlots) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512);

    put_u64(&mut buf, tx.nonce);
    put_uint(&mut buf, tx.gas_price);
    put_u64(&mut buf, tx.gas_limit);
    put_opt_addr(&mut buf, tx.recipient.as_ref());
    put_uint(&mut buf, tx.amount);
    put_bytes(&mut buf, &tx.payload);

    match slots {
        SigSlots::Actual => match &tx.signature {
            Some(sig) => {
                put_uint(&mut buf, u128::from(sig.v));
                put_bytes(&mut buf, &sig.r);
                put_bytes(&mut buf, &sig.s);
            }
            None => {
                put_uint(&mut buf, 0);
                put_bytes(&mut buf, &[]);
                put_bytes(&mut buf, &[]);
            }
        },
        SigSlots::Sighash { epoch } => {
            put_uint(&mut buf, u128::from(epoch));
            put_bytes(&mut buf, &[]);
            put_bytes(&mut buf, &[]);
        }
    }

    put_bytes(&mut buf, &[tx.kind.code()]);

    // Confidential fields, empty when a kind does not carry them.
    let (zk_value, serial, sender_serial) = match &tx.kind {
        TxKind::Public => (0, None, None),
        TxKind::Mint(d) => (d.value, Some(&d.serial), None),
        TxKind::Send(d) => (0, Some(&d.serial), None),
        TxKind::Deposit(d) => (0, Some(&d.serial), Some(&d.sender_serial)),
        TxKind::Update(d) => (0, Some(&d.serial), None),
        TxKind::Redeem(d) => (d.value, Some(&d.serial), None),
    };
    put_u64(&mut buf, zk_value);
    put_opt_hash(&mut buf, serial);
    put_opt_hash(&mut buf, sender_serial);

    let (note_nonce, note_recipient) = match &tx.kind {
        TxKind::Send(d) => (d.note_nonce, d.note_recipient.as_ref()),
        _ => (0, None),
    };
    put_u64(&mut buf, note_nonce);
    put_opt_addr(&mut buf, note_recipient);

    put_opt_hash(&mut buf, tx.kind.commitment());
    let transfer_commitment = match &tx.kind {
        TxKind::Send(d) => Some(&d.transfer_commitment),
        _ => None,
    };
    put_opt_hash(&mut buf, transfer_commitment);

    let proof: &[u8] = match &tx.kind {
        TxKind::Public => &[],
        TxKind::Mint(d) => &d.proof,
        TxKind::Send(d) => &d.proof,
        TxKind::Deposit(d) => &d.proof,
        TxKind::Update(d) => &d.proof,
        TxKind::Redeem(d) => &d.proof,
    };
    put_bytes(&mut buf, proof);

    let (root, blocks) = match &tx.kind {
        TxKind::Deposit(d) => (Some(&d.root), d.commitment_blocks.as_slice()),
        TxKind::Update(d) => (Some(&d.root), d.commitment_blocks.as_slice()),
        _ => (None, &[][..]),
    };
    put_opt_hash(&mut buf, root);
    put_u64_list(&mut buf, blocks);

    let aux: &[u8] = match &tx.kind {
        TxKind::Send(d) => &d.note_ciphertext,
        _ => &[],
    };
    put_bytes(&mut buf, aux);

    match &tx.kind {
        TxKind::Deposit(d) => {
            put_bytes(&mut buf, &d.one_time_key.x);
            put_bytes(&mut buf, &d.one_time_key.y);
            match &d.signature {
                Some(sig) => {
                    put_uint(&mut buf, u128::from(sig.v));
                    put_bytes(&mut buf, &sig.r);
                    put_bytes(&mut buf, &sig.s);
                }
                None => {
                    put_bytes(&mut buf, &[]);
                    put_bytes(&mut buf, &[]);
                    put_bytes(&mut buf, &[]);
                }
            }
        }
        _ => {
            put_bytes(&mut buf, &[]);
            put_bytes(&mut buf, &[]);
            put_bytes(&mut buf, &[]);
            put_bytes(&mut buf, &[]);
            put_bytes(&mut buf, &[]);
        }
    }

    buf
}

/// Encode a transaction in its full canonical form (signature included).
pub fn encode(tx: &Transaction) -> Vec<u8> {
    encode_inner(tx, SigSlots::Actual)
}

/// Encode the signing preimage: `r`/`s` empty, `v` carrying the chain
/// epoch. This is what makes a signature valid on exactly one chain.
pub fn sighash_preimage(tx: &Transaction, epoch: u64) -> Vec<u8> {
    encode_inner(tx, SigSlots::Sighash { epoch })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Raw field images read from the wire, before kind validation.
struct RawTx {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    recipient: Option<Address>,
    amount: u128,
    payload: Vec<u8>,
    signature: Option<RecoverableSignature>,
    code: u8,
    zk_value: u64,
    serial: Option<Hash>,
    sender_serial: Option<Hash>,
    note_nonce: u64,
    note_recipient: Option<Address>,
    commitment: Option<Hash>,
    transfer_commitment: Option<Hash>,
    proof: Vec<u8>,
    root: Option<Hash>,
    commitment_blocks: Vec<u64>,
    aux: Vec<u8>,
    x: Option<[u8; 32]>,
    y: Option<[u8; 32]>,
    deposit_signature: Option<RecoverableSignature>,
}

fn read_signature(
    v: Option<u128>,
    r: Option<[u8; 32]>,
    s: Option<[u8; 32]>,
    unsigned_v_zero: bool,
) -> Result<Option<RecoverableSignature>, DecodeError> {
    match (r, s) {
        (Some(r), Some(s)) => {
            let v = v.ok_or(DecodeError::MalformedSignature)?;
            let v = u64::try_from(v).map_err(|_| DecodeError::MalformedSignature)?;
            Ok(Some(RecoverableSignature { v, r, s }))
        }
        (None, None) => {
            // An unsigned transaction still encodes v = 0; a deposit slot
            // is simply empty.
            match v {
                Some(0) if unsigned_v_zero => Ok(None),
                None if !unsigned_v_zero => Ok(None),
                _ => Err(DecodeError::MalformedSignature),
            }
        }
        _ => Err(DecodeError::MalformedSignature),
    }
}

fn read_raw(reader: &mut Reader<'_>) -> Result<RawTx, DecodeError> {
    let nonce = reader.take_u64("nonce")?;
    let gas_price = reader.take_uint("gasPrice")?;
    let gas_limit = reader.take_u64("gasLimit")?;
    let recipient = reader.take_opt_addr("recipient")?;
    let amount = reader.take_uint("amount")?;
    let payload = reader.take_field()?.to_vec();

    let v = reader.take_opt_uint("v")?;
    let r = reader.take_opt_word("r")?;
    let s = reader.take_opt_word("s")?;
    let signature = read_signature(v, r, s, true)?;

    let code_field = reader.take_field()?;
    let code = match code_field {
        [c] => *c,
        _ => {
            return Err(DecodeError::InvalidLength {
                field: "code",
                len: code_field.len(),
            })
        }
    };

    let zk_value = reader.take_u64("zkValue")?;
    let serial = reader.take_opt_hash("SN")?;
    let sender_serial = reader.take_opt_hash("SNS")?;
    let note_nonce = reader.take_u64("zkNonce")?;
    let note_recipient = reader.take_opt_addr("zkAddress")?;
    let commitment = reader.take_opt_hash("CMT")?;
    let transfer_commitment = reader.take_opt_hash("CMTS")?;

    let proof = reader.take_field()?.to_vec();
    if proof.len() > MAX_PROOF_BYTES {
        return Err(DecodeError::ProofTooLarge {
            len: proof.len(),
            max: MAX_PROOF_BYTES,
        });
    }

    let root = reader.take_opt_hash("RT")?;
    let commitment_blocks = reader.take_u64_list("cmtBlockList")?;
    let aux = reader.take_field()?.to_vec();
    let x = reader.take_opt_word("X")?;
    let y = reader.take_opt_word("Y")?;

    let dep_v = reader.take_opt_uint("depV")?;
    let dep_r = reader.take_opt_word("depR")?;
    let dep_s = reader.take_opt_word("depS")?;
    let deposit_signature = read_signature(dep_v, dep_r, dep_s, false)?;

    Ok(RawTx {
        nonce,
        gas_price,
        gas_limit,
        recipient,
        amount,
        payload,
        signature,
        code,
        zk_value,
        serial,
        sender_serial,
        note_nonce,
        note_recipient,
        commitment,
        transfer_commitment,
        proof,
        root,
        commitment_blocks,
        aux,
        x,
        y,
        deposit_signature,
    })
}

/// Per-kind field validation: everything required is present, everything
/// forbidden is absent.
fn build_kind(raw: &RawTx) -> Result<TxKind, DecodeError> {
    let kind_name = |code: u8| match code {
        CODE_PUBLIC => "public",
        CODE_MINT => "mint",
        CODE_SEND => "send",
        CODE_DEPOSIT => "deposit",
        CODE_UPDATE => "update",
        CODE_REDEEM => "redeem",
        _ => "unknown",
    };
    let kind = kind_name(raw.code);

    let require = |present: bool, field: &'static str| {
        if present {
            Ok(())
        } else {
            Err(DecodeError::MissingField { kind, field })
        }
    };
    let forbid = |absent: bool, field: &'static str| {
        if absent {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedField { kind, field })
        }
    };

    match raw.code {
        CODE_PUBLIC => {
            forbid(raw.zk_value == 0, "zkValue")?;
            forbid(raw.serial.is_none(), "SN")?;
            forbid(raw.sender_serial.is_none(), "SNS")?;
            forbid(raw.note_nonce == 0, "zkNonce")?;
            forbid(raw.note_recipient.is_none(), "zkAddress")?;
            forbid(raw.commitment.is_none(), "CMT")?;
            forbid(raw.transfer_commitment.is_none(), "CMTS")?;
            forbid(raw.proof.is_empty(), "proof")?;
            forbid(raw.root.is_none(), "RT")?;
            forbid(raw.commitment_blocks.is_empty(), "cmtBlockList")?;
            forbid(raw.aux.is_empty(), "aux")?;
            forbid(raw.x.is_none(), "X")?;
            forbid(raw.y.is_none(), "Y")?;
            forbid(raw.deposit_signature.is_none(), "depositSignature")?;
            Ok(TxKind::Public)
        }
        CODE_MINT | CODE_REDEEM => {
            let serial = raw.serial.ok_or(DecodeError::MissingField {
                kind,
                field: "SN",
            })?;
            let commitment = raw.commitment.ok_or(DecodeError::MissingField {
                kind,
                field: "CMT",
            })?;
            require(!raw.proof.is_empty(), "proof")?;
            forbid(raw.sender_serial.is_none(), "SNS")?;
            forbid(raw.note_nonce == 0, "zkNonce")?;
            forbid(raw.note_recipient.is_none(), "zkAddress")?;
            forbid(raw.transfer_commitment.is_none(), "CMTS")?;
            forbid(raw.root.is_none(), "RT")?;
            forbid(raw.commitment_blocks.is_empty(), "cmtBlockList")?;
            forbid(raw.aux.is_empty(), "aux")?;
            forbid(raw.x.is_none(), "X")?;
            forbid(raw.y.is_none(), "Y")?;
            forbid(raw.deposit_signature.is_none(), "depositSignature")?;

            if raw.code == CODE_MINT {
                Ok(TxKind::Mint(MintData {
                    value: raw.zk_value,
                    serial,
                    commitment,
                    proof: raw.proof.clone(),
                }))
            } else {
                Ok(TxKind::Redeem(RedeemData {
                    value: raw.zk_value,
                    serial,
                    commitment,
                    proof: raw.proof.clone(),
                }))
            }
        }
        CODE_SEND => {
            let serial = raw.serial.ok_or(DecodeError::MissingField {
                kind,
                field: "SN",
            })?;
            let commitment = raw.commitment.ok_or(DecodeError::MissingField {
                kind,
                field: "CMT",
            })?;
            let transfer_commitment =
                raw.transfer_commitment.ok_or(DecodeError::MissingField {
                    kind,
                    field: "CMTS",
                })?;
            require(!raw.proof.is_empty(), "proof")?;
            forbid(raw.zk_value == 0, "zkValue")?;
            forbid(raw.sender_serial.is_none(), "SNS")?;
            forbid(raw.root.is_none(), "RT")?;
            forbid(raw.commitment_blocks.is_empty(), "cmtBlockList")?;
            forbid(raw.x.is_none(), "X")?;
            forbid(raw.y.is_none(), "Y")?;
            forbid(raw.deposit_signature.is_none(), "depositSignature")?;

            Ok(TxKind::Send(SendData {
                serial,
                commitment,
                transfer_commitment,
                proof: raw.proof.clone(),
                note_nonce: raw.note_nonce,
                note_recipient: raw.note_recipient,
                note_ciphertext: raw.aux.clone(),
            }))
        }
        CODE_DEPOSIT => {
            let serial = raw.serial.ok_or(DecodeError::MissingField {
                kind,
                field: "SN",
            })?;
            let sender_serial = raw.sender_serial.ok_or(DecodeError::MissingField {
                kind,
                field: "SNS",
            })?;
            let commitment = raw.commitment.ok_or(DecodeError::MissingField {
                kind,
                field: "CMT",
            })?;
            let root = raw.root.ok_or(DecodeError::MissingField {
                kind,
                field: "RT",
            })?;
            let x = raw.x.ok_or(DecodeError::MissingField { kind, field: "X" })?;
            let y = raw.y.ok_or(DecodeError::MissingField { kind, field: "Y" })?;
            require(!raw.proof.is_empty(), "proof")?;
            forbid(raw.zk_value == 0, "zkValue")?;
            forbid(raw.note_nonce == 0, "zkNonce")?;
            forbid(raw.note_recipient.is_none(), "zkAddress")?;
            forbid(raw.transfer_commitment.is_none(), "CMTS")?;
            forbid(raw.aux.is_empty(), "aux")?;

            Ok(TxKind::Deposit(DepositData {
                serial,
                sender_serial,
                commitment,
                root,
                commitment_blocks: raw.commitment_blocks.clone(),
                one_time_key: OneTimeKey { x, y },
                proof: raw.proof.clone(),
                signature: raw.deposit_signature,
            }))
        }
        CODE_UPDATE => {
            let serial = raw.serial.ok_or(DecodeError::MissingField {
                kind,
                field: "SN",
            })?;
            let commitment = raw.commitment.ok_or(DecodeError::MissingField {
                kind,
                field: "CMT",
            })?;
            let root = raw.root.ok_or(DecodeError::MissingField {
                kind,
                field: "RT",
            })?;
            require(!raw.proof.is_empty(), "proof")?;
            forbid(raw.zk_value == 0, "zkValue")?;
            forbid(raw.sender_serial.is_none(), "SNS")?;
            forbid(raw.note_nonce == 0, "zkNonce")?;
            forbid(raw.note_recipient.is_none(), "zkAddress")?;
            forbid(raw.transfer_commitment.is_none(), "CMTS")?;
            forbid(raw.aux.is_empty(), "aux")?;
            forbid(raw.x.is_none(), "X")?;
            forbid(raw.y.is_none(), "Y")?;
            forbid(raw.deposit_signature.is_none(), "depositSignature")?;

            Ok(TxKind::Update(UpdateData {
                serial,
                commitment,
                root,
                commitment_blocks: raw.commitment_blocks.clone(),
                proof: raw.proof.clone(),
            }))
        }
        other => Err(DecodeError::UnknownTxKind(other)),
    }
}

/// Decode a transaction from its canonical form.
pub fn decode(data: &[u8]) -> Result<Transaction, DecodeError> {
    let mut reader = Reader::new(data);
    let raw = read_raw(&mut reader)?;
    reader.finish()?;

    let kind = build_kind(&raw)?;

    Ok(Transaction {
        nonce: raw.nonce,
        gas_price: raw.gas_price,
        gas_limit: raw.gas_limit,
        recipient: raw.recipient,
        amount: raw.amount,
        payload: raw.payload,
        kind,
        signature: raw.signature,
    })
}

// ---------------------------------------------------------------------------
// Deposit preimage
// ---------------------------------------------------------------------------

/// The preimage of the Deposit auxiliary signature: the confidential
/// fields plus the one-time key, in canonical field order. `None` for any
/// other kind.
///
/// The auxiliary signature slots themselves are excluded — this is what
/// the one-time key signs, so it cannot contain its own output.
pub(crate) fn deposit_preimage(tx: &Transaction) -> Option<Vec<u8>> {
    let TxKind::Deposit(d) = &tx.kind else {
        return None;
    };

    let mut buf = Vec::with_capacity(256);
    put_bytes(&mut buf, &[CODE_DEPOSIT]);
    put_bytes(&mut buf, d.serial.as_bytes());
    put_bytes(&mut buf, d.sender_serial.as_bytes());
    put_bytes(&mut buf, d.commitment.as_bytes());
    put_bytes(&mut buf, d.root.as_bytes());
    put_u64_list(&mut buf, &d.commitment_blocks);
    put_bytes(&mut buf, &d.proof);
    put_bytes(&mut buf, &d.one_time_key.x);
    put_bytes(&mut buf, &d.one_time_key.y);
    Some(buf)
}

// ---------------------------------------------------------------------------
// Message envelope
// ---------------------------------------------------------------------------

/// Wire tag for the extended transaction message.
const MSG_EXTENDED: u8 = 0x00;
/// Wire tag for the chain-native transfer message.
const MSG_NATIVE: u8 = 0x01;

fn encode_native(m: &NativeTransfer) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    put_bytes(&mut buf, m.from.as_bytes());
    put_u64(&mut buf, m.nonce);
    put_uint(&mut buf, m.gas_price);
    put_u64(&mut buf, m.gas_limit);
    put_opt_addr(&mut buf, m.recipient.as_ref());
    put_uint(&mut buf, m.amount);
    put_bytes(&mut buf, &m.payload);
    buf
}

fn decode_native(data: &[u8]) -> Result<NativeTransfer, DecodeError> {
    let mut reader = Reader::new(data);
    let from_bytes = reader.take_field()?;
    let from = Address::from_slice(from_bytes).ok_or(DecodeError::InvalidLength {
        field: "from",
        len: from_bytes.len(),
    })?;
    let nonce = reader.take_u64("nonce")?;
    let gas_price = reader.take_uint("gasPrice")?;
    let gas_limit = reader.take_u64("gasLimit")?;
    let recipient = reader.take_opt_addr("recipient")?;
    let amount = reader.take_uint("amount")?;
    let payload = reader.take_field()?.to_vec();
    reader.finish()?;

    Ok(NativeTransfer {
        from,
        nonce,
        gas_price,
        gas_limit,
        recipient,
        amount,
        payload,
    })
}

impl Msg {
    /// Encode the message envelope: a one-byte tag plus the payload.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Msg::Extended(tx) => {
                let mut buf = vec![MSG_EXTENDED];
                buf.extend_from_slice(&encode(tx));
                buf
            }
            Msg::Native(m) => {
                let mut buf = vec![MSG_NATIVE];
                buf.extend_from_slice(&encode_native(m));
                buf
            }
        }
    }

    /// Decode a message envelope. Unknown tags are rejected here — the
    /// handler never sees a message kind it does not understand.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (&tag, rest) = data.split_first().ok_or(DecodeError::Truncated)?;
        match tag {
            MSG_EXTENDED => Ok(Msg::Extended(decode(rest)?)),
            MSG_NATIVE => Ok(Msg::Native(decode_native(rest)?)),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
