//! Transaction hashing, signing, and sender recovery.
//!
//! Signing is a separate step from building: the canonical sighash is the
//! Keccak-256 of the encoding with the signature slots replaced by the
//! chain epoch (see [`super::encoding::sighash_preimage`]), and the sender
//! is recovered from `{v, r, s}` rather than carried in the transaction.
//!
//! Deposit transactions additionally carry an auxiliary signature made
//! with the recipient's one-time key over the confidential fields; the
//! handler checks that it recovers to the address pinned by the declared
//! `(X, Y)` point. Attach it *before* the sender signature — the sender
//! signs over it.

use crate::crypto::hash::{keccak256, Address, Hash};
use crate::crypto::keys::{
    recover_address, recover_address_bare, Keypair, SignatureError,
};

use super::encoding::{deposit_preimage, encode, sighash_preimage};
use super::types::{Transaction, TxKind};

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// The canonical transaction hash: Keccak-256 over the full signed
/// encoding. This is the hash logs are indexed under and the one users
/// quote.
pub fn transaction_hash(tx: &Transaction) -> Hash {
    keccak256(&encode(tx))
}

/// The digest the sender signs: Keccak-256 over the sighash preimage for
/// the given chain epoch.
pub fn sighash(tx: &Transaction, epoch: u64) -> Hash {
    keccak256(&sighash_preimage(tx, epoch))
}

/// The digest the Deposit auxiliary signature covers. `None` for
/// non-Deposit kinds.
pub fn deposit_digest(tx: &Transaction) -> Option<Hash> {
    deposit_preimage(tx).map(|bytes| keccak256(&bytes))
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// Sign a transaction in place with the sender keypair.
///
/// Overwrites any existing signature. The transaction hash changes when
/// the signature is attached (the hash covers the full encoding), but the
/// sighash does not — it is signature-independent by construction.
pub fn sign_transaction(
    tx: &mut Transaction,
    keypair: &Keypair,
    epoch: u64,
) -> Result<(), SignatureError> {
    let digest = sighash(tx, epoch);
    tx.signature = Some(keypair.sign_digest(&digest, epoch)?);
    Ok(())
}

/// Attach the Deposit auxiliary signature using the one-time keypair.
///
/// Fails on non-Deposit kinds: there is no auxiliary slot to fill.
pub fn sign_deposit(tx: &mut Transaction, one_time_keypair: &Keypair) -> Result<(), SignatureError> {
    let digest = deposit_digest(tx)
        .ok_or_else(|| SignatureError::Signing("not a deposit transaction".to_string()))?;
    let sig = one_time_keypair.sign_digest_bare(&digest)?;

    match &mut tx.kind {
        TxKind::Deposit(d) => {
            d.signature = Some(sig);
            Ok(())
        }
        _ => unreachable!("deposit_digest returned Some for a non-deposit kind"),
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Recover the sender address from the transaction signature.
pub fn recover_sender(tx: &Transaction, epoch: u64) -> Result<Address, SignatureError> {
    let sig = tx.signature.as_ref().ok_or(SignatureError::Missing)?;
    let digest = sighash(tx, epoch);
    recover_address(&digest, sig, epoch)
}

/// Recover the address that produced the Deposit auxiliary signature.
pub fn recover_deposit_signer(tx: &Transaction) -> Result<Address, SignatureError> {
    let TxKind::Deposit(d) = &tx.kind else {
        return Err(SignatureError::Missing);
    };
    let sig = d.signature.as_ref().ok_or(SignatureError::Missing)?;
    let digest = deposit_digest(tx).expect("kind is deposit");
    recover_address_bare(&digest, sig)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
