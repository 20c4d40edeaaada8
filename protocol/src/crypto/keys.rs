//! # Keys & Recoverable Signatures
//!
//! Account authentication is recoverable ECDSA over secp256k1: a signature
//! is the `{v, r, s}` triple, and the sender is *recovered* from it rather
//! than carried alongside. Two folding conventions are in play:
//!
//! - **Transaction signatures** fold the chain epoch into `v`
//!   (`v = recovery_id + 35 + 2 * epoch`), so a signature is only valid on
//!   the chain it was produced for.
//! - **Deposit auxiliary signatures** use the bare historical form
//!   (`v = recovery_id + 27`). They are made with a one-time key and are
//!   checked by recovering an address and comparing it against
//!   [`pubkey_to_address`] of the declared `(X, Y)` point, so replay
//!   protection comes from the enclosing transaction.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::{keccak256_multi, Address, Hash};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by signing and recovery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The transaction carries no signature.
    #[error("missing signature")]
    Missing,

    /// `r`/`s` do not form a valid secp256k1 scalar pair.
    #[error("malformed signature: {0}")]
    Malformed(String),

    /// `v` does not encode a recovery id under the expected folding.
    #[error("invalid recovery value v={0}")]
    InvalidRecoveryValue(u64),

    /// Public-key recovery failed (the signature does not match any key).
    #[error("signature recovery failed")]
    RecoveryFailed,

    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

// ---------------------------------------------------------------------------
// RecoverableSignature
// ---------------------------------------------------------------------------

/// An ECDSA signature in `{v, r, s}` form.
///
/// `r` and `s` are big-endian scalars; `v` carries the recovery id under
/// one of the two folding conventions described in the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverableSignature {
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl RecoverableSignature {
    /// Extract the recovery id assuming chain-folded `v`.
    fn recovery_id_folded(&self, epoch: u64) -> Result<RecoveryId, SignatureError> {
        let base = 35 + 2 * epoch;
        let rec = self
            .v
            .checked_sub(base)
            .ok_or(SignatureError::InvalidRecoveryValue(self.v))?;
        u8::try_from(rec)
            .ok()
            .and_then(RecoveryId::from_byte)
            .ok_or(SignatureError::InvalidRecoveryValue(self.v))
    }

    /// Extract the recovery id assuming bare `v = 27 + id`.
    fn recovery_id_bare(&self) -> Result<RecoveryId, SignatureError> {
        let rec = self
            .v
            .checked_sub(27)
            .ok_or(SignatureError::InvalidRecoveryValue(self.v))?;
        u8::try_from(rec)
            .ok()
            .and_then(RecoveryId::from_byte)
            .ok_or(SignatureError::InvalidRecoveryValue(self.v))
    }

    fn to_ecdsa(&self) -> Result<EcdsaSignature, SignatureError> {
        EcdsaSignature::from_scalars(self.r, self.s)
            .map_err(|e| SignatureError::Malformed(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// An uncompressed secp256k1 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// The affine X coordinate, big-endian.
    pub fn x(&self) -> [u8; 32] {
        let point = self.0.to_encoded_point(false);
        point.as_bytes()[1..33].try_into().expect("fixed layout")
    }

    /// The affine Y coordinate, big-endian.
    pub fn y(&self) -> [u8; 32] {
        let point = self.0.to_encoded_point(false);
        point.as_bytes()[33..65].try_into().expect("fixed layout")
    }

    /// The account address: trailing 20 bytes of `keccak256(X || Y)`.
    pub fn address(&self) -> Address {
        pubkey_to_address(&self.x(), &self.y())
    }

    /// The `(X, Y)` coordinate pair as a [`OneTimeKey`].
    pub fn one_time_key(&self) -> OneTimeKey {
        OneTimeKey {
            x: self.x(),
            y: self.y(),
        }
    }
}

// ---------------------------------------------------------------------------
// OneTimeKey
// ---------------------------------------------------------------------------

/// The raw `(X, Y)` coordinates of a randomized one-time public key, as
/// carried by Deposit transactions.
///
/// The chain never does curve arithmetic on these — they feed the deposit
/// proof's public inputs and the address comparison against the auxiliary
/// signature, both of which treat the point as opaque bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl OneTimeKey {
    /// The address this key pins: trailing 20 bytes of `keccak256(X || Y)`.
    pub fn address(&self) -> Address {
        pubkey_to_address(&self.x, &self.y)
    }
}

/// Derive an account address from raw public-key coordinates.
pub fn pubkey_to_address(x: &[u8; 32], y: &[u8; 32]) -> Address {
    let digest = keccak256_multi(&[x, y]);
    Address::from_slice(&digest.as_bytes()[12..]).expect("20-byte tail of a 32-byte digest")
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// A secp256k1 signing keypair.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS entropy source.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstruct from a 32-byte secret scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let signing =
            SigningKey::from_slice(bytes).map_err(|e| SignatureError::Malformed(e.to_string()))?;
        Ok(Self { signing })
    }

    /// The 32-byte secret scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes().into()
    }

    /// The public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().clone())
    }

    /// The account address controlled by this keypair.
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    fn sign_prehash(&self, digest: &Hash) -> Result<(EcdsaSignature, RecoveryId), SignatureError> {
        self.signing
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| SignatureError::Signing(e.to_string()))
    }

    /// Sign a 32-byte digest with the chain epoch folded into `v`.
    pub fn sign_digest(
        &self,
        digest: &Hash,
        epoch: u64,
    ) -> Result<RecoverableSignature, SignatureError> {
        let (sig, recid) = self.sign_prehash(digest)?;
        let (r, s) = sig.split_bytes();
        Ok(RecoverableSignature {
            v: u64::from(recid.to_byte()) + 35 + 2 * epoch,
            r: r.into(),
            s: s.into(),
        })
    }

    /// Sign a 32-byte digest in the bare `v = 27 + id` form (used for the
    /// Deposit auxiliary signature).
    pub fn sign_digest_bare(&self, digest: &Hash) -> Result<RecoverableSignature, SignatureError> {
        let (sig, recid) = self.sign_prehash(digest)?;
        let (r, s) = sig.split_bytes();
        Ok(RecoverableSignature {
            v: u64::from(recid.to_byte()) + 27,
            r: r.into(),
            s: s.into(),
        })
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret scalar stays out of logs.
        write!(f, "Keypair({})", self.address())
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Recover the signer address from a digest and a chain-folded signature.
pub fn recover_address(
    digest: &Hash,
    sig: &RecoverableSignature,
    epoch: u64,
) -> Result<Address, SignatureError> {
    let recid = sig.recovery_id_folded(epoch)?;
    recover_with(digest, sig, recid)
}

/// Recover the signer address from a digest and a bare (`v = 27 + id`)
/// signature.
pub fn recover_address_bare(
    digest: &Hash,
    sig: &RecoverableSignature,
) -> Result<Address, SignatureError> {
    let recid = sig.recovery_id_bare()?;
    recover_with(digest, sig, recid)
}

fn recover_with(
    digest: &Hash,
    sig: &RecoverableSignature,
    recid: RecoveryId,
) -> Result<Address, SignatureError> {
    let ecdsa = sig.to_ecdsa()?;
    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &ecdsa, recid)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(PublicKey(key).address())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    #[test]
    fn sign_and_recover_round_trip() {
        let kp = Keypair::generate();
        let digest = keccak256(b"payload");

        let sig = kp.sign_digest(&digest, 9000).unwrap();
        let recovered = recover_address(&digest, &sig, 9000).unwrap();

        assert_eq!(recovered, kp.address());
    }

    #[test]
    fn recovery_with_wrong_epoch_fails_or_mismatches() {
        let kp = Keypair::generate();
        let digest = keccak256(b"payload");
        let sig = kp.sign_digest(&digest, 9000).unwrap();

        match recover_address(&digest, &sig, 9001) {
            Ok(addr) => assert_ne!(addr, kp.address()),
            Err(e) => assert!(matches!(
                e,
                SignatureError::InvalidRecoveryValue(_) | SignatureError::RecoveryFailed
            )),
        }
    }

    #[test]
    fn recovery_of_different_digest_mismatches() {
        let kp = Keypair::generate();
        let sig = kp.sign_digest(&keccak256(b"one"), 9000).unwrap();

        match recover_address(&keccak256(b"two"), &sig, 9000) {
            Ok(addr) => assert_ne!(addr, kp.address()),
            Err(e) => assert_eq!(e, SignatureError::RecoveryFailed),
        }
    }

    #[test]
    fn bare_signature_round_trip() {
        let kp = Keypair::generate();
        let digest = keccak256(b"deposit digest");

        let sig = kp.sign_digest_bare(&digest).unwrap();
        assert!(sig.v == 27 || sig.v == 28);

        let recovered = recover_address_bare(&digest, &sig).unwrap();
        assert_eq!(recovered, kp.address());
    }

    #[test]
    fn one_time_key_address_matches_public_key() {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        assert_eq!(pk.one_time_key().address(), pk.address());
        assert_eq!(pubkey_to_address(&pk.x(), &pk.y()), kp.address());
    }

    #[test]
    fn keypair_bytes_round_trip() {
        let kp = Keypair::generate();
        let restored = Keypair::from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(restored.address(), kp.address());
    }

    #[test]
    fn invalid_recovery_value_is_rejected() {
        let kp = Keypair::generate();
        let digest = keccak256(b"payload");
        let mut sig = kp.sign_digest(&digest, 9000).unwrap();
        sig.v = 5;

        assert!(matches!(
            recover_address(&digest, &sig, 9000),
            Err(SignatureError::InvalidRecoveryValue(5))
        ));
    }
}
