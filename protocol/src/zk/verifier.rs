//! # Confidential-Operation Verification
//!
//! The consensus-side half of the proof system: five entry points, one per
//! confidential operation, each total — a call either returns `Ok(())` or
//! the operation's specific failure. The handler aborts the transaction on
//! any failure before touching state, so a bad proof can never half-apply.
//!
//! Verification is three pairings plus a multi-scalar multiplication per
//! proof — constant time in circuit size, well under 5 ms on commodity
//! hardware — which is why it is safe to run unmetered under the
//! [`crate::config::MAX_PROOF_BYTES`] ceiling.
//!
//! ## Public-input layout
//!
//! Each operation fixes an ordered scalar vector derived from chain state
//! and transaction fields (see the `*_public_inputs` functions). These
//! layouts are consensus-critical: prover and verifier must agree on both
//! order and derivation, and the assembled vector is exactly what binds a
//! proof to the commitment/serial/root values the handler read.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use thiserror::Error;

use crate::crypto::hash::{hash_to_field, Hash};
use crate::crypto::keys::OneTimeKey;

use super::proof::ZkProof;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Proof-verification failures, one per operation.
///
/// Deliberately carries no detail: the caller only needs to know *which*
/// check failed, and a malformed blob is indistinguishable from a proof
/// that fails the pairing check — both mean "this transaction lied".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("invalid mint proof")]
    InvalidMintProof,

    #[error("invalid send proof")]
    InvalidSendProof,

    #[error("invalid deposit proof")]
    InvalidDepositProof,

    #[error("invalid redeem proof")]
    InvalidRedeemProof,

    #[error("invalid update proof")]
    InvalidUpdateProof,
}

// ---------------------------------------------------------------------------
// Public-input assembly
// ---------------------------------------------------------------------------

fn field(h: &Hash) -> Fr {
    hash_to_field(h.as_bytes())
}

fn key_field(pk: &OneTimeKey) -> Fr {
    let mut bytes = [0u8; 64];
    bytes[..32].copy_from_slice(&pk.x);
    bytes[32..].copy_from_slice(&pk.y);
    hash_to_field(&bytes)
}

/// Mint statement: new commitment credits `value` onto the old balance.
pub fn mint_public_inputs(
    old_balance: &Hash,
    serial: &Hash,
    commitment: &Hash,
    value: u64,
) -> Vec<Fr> {
    vec![
        field(old_balance),
        field(serial),
        field(commitment),
        Fr::from(value),
    ]
}

/// Send statement: debit into a transfer commitment.
pub fn send_public_inputs(
    serial: &Hash,
    transfer_commitment: &Hash,
    old_balance: &Hash,
    commitment: &Hash,
) -> Vec<Fr> {
    vec![
        field(serial),
        field(transfer_commitment),
        field(old_balance),
        field(commitment),
    ]
}

/// Deposit statement: claim a tree commitment encrypted to the one-time key.
pub fn deposit_public_inputs(
    one_time_key: &OneTimeKey,
    root: &Hash,
    old_balance: &Hash,
    serial: &Hash,
    commitment: &Hash,
    sender_serial: &Hash,
) -> Vec<Fr> {
    vec![
        key_field(one_time_key),
        field(root),
        field(old_balance),
        field(serial),
        field(commitment),
        field(sender_serial),
    ]
}

/// Redeem statement: symmetric to Mint, debiting `value`.
pub fn redeem_public_inputs(
    old_balance: &Hash,
    serial: &Hash,
    commitment: &Hash,
    value: u64,
) -> Vec<Fr> {
    vec![
        field(old_balance),
        field(serial),
        field(commitment),
        Fr::from(value),
    ]
}

/// Update statement: re-randomization against a tree root.
pub fn update_public_inputs(old_balance: &Hash, root: &Hash, commitment: &Hash) -> Vec<Fr> {
    vec![field(old_balance), field(root), field(commitment)]
}

// ---------------------------------------------------------------------------
// TransferVerifier
// ---------------------------------------------------------------------------

/// Holds the five Groth16 verifying keys, one per confidential operation.
///
/// Small (~1 KiB each) and freely distributable; every validator loads the
/// same set at startup. The verifier is stateless — it borrows nothing
/// from the store and writes nothing.
pub struct TransferVerifier {
    mint_vk: VerifyingKey<Bn254>,
    send_vk: VerifyingKey<Bn254>,
    deposit_vk: VerifyingKey<Bn254>,
    redeem_vk: VerifyingKey<Bn254>,
    update_vk: VerifyingKey<Bn254>,
}

impl TransferVerifier {
    /// Construct from the five verifying keys (called by the dev ceremony
    /// or after deserializing distribution bytes).
    pub(crate) fn from_keys(
        mint_vk: VerifyingKey<Bn254>,
        send_vk: VerifyingKey<Bn254>,
        deposit_vk: VerifyingKey<Bn254>,
        redeem_vk: VerifyingKey<Bn254>,
        update_vk: VerifyingKey<Bn254>,
    ) -> Self {
        Self {
            mint_vk,
            send_vk,
            deposit_vk,
            redeem_vk,
            update_vk,
        }
    }

    /// Verify a Mint proof. Fails with [`VerifyError::InvalidMintProof`].
    pub fn verify_mint(
        &self,
        old_balance: &Hash,
        serial: &Hash,
        commitment: &Hash,
        value: u64,
        proof: &[u8],
    ) -> Result<(), VerifyError> {
        let inputs = mint_public_inputs(old_balance, serial, commitment, value);
        self.check(&self.mint_vk, &inputs, proof, VerifyError::InvalidMintProof)
    }

    /// Verify a Send proof. Fails with [`VerifyError::InvalidSendProof`].
    pub fn verify_send(
        &self,
        serial: &Hash,
        transfer_commitment: &Hash,
        proof: &[u8],
        old_balance: &Hash,
        commitment: &Hash,
    ) -> Result<(), VerifyError> {
        let inputs = send_public_inputs(serial, transfer_commitment, old_balance, commitment);
        self.check(&self.send_vk, &inputs, proof, VerifyError::InvalidSendProof)
    }

    /// Verify a Deposit proof. Fails with [`VerifyError::InvalidDepositProof`].
    #[allow(clippy::too_many_arguments)]
    pub fn verify_deposit(
        &self,
        one_time_key: &OneTimeKey,
        root: &Hash,
        old_balance: &Hash,
        serial: &Hash,
        commitment: &Hash,
        sender_serial: &Hash,
        proof: &[u8],
    ) -> Result<(), VerifyError> {
        let inputs = deposit_public_inputs(
            one_time_key,
            root,
            old_balance,
            serial,
            commitment,
            sender_serial,
        );
        self.check(
            &self.deposit_vk,
            &inputs,
            proof,
            VerifyError::InvalidDepositProof,
        )
    }

    /// Verify a Redeem proof. Fails with [`VerifyError::InvalidRedeemProof`].
    pub fn verify_redeem(
        &self,
        old_balance: &Hash,
        serial: &Hash,
        commitment: &Hash,
        value: u64,
        proof: &[u8],
    ) -> Result<(), VerifyError> {
        let inputs = redeem_public_inputs(old_balance, serial, commitment, value);
        self.check(
            &self.redeem_vk,
            &inputs,
            proof,
            VerifyError::InvalidRedeemProof,
        )
    }

    /// Verify an Update proof. Fails with [`VerifyError::InvalidUpdateProof`].
    pub fn verify_update(
        &self,
        old_balance: &Hash,
        root: &Hash,
        commitment: &Hash,
        proof: &[u8],
    ) -> Result<(), VerifyError> {
        let inputs = update_public_inputs(old_balance, root, commitment);
        self.check(
            &self.update_vk,
            &inputs,
            proof,
            VerifyError::InvalidUpdateProof,
        )
    }

    /// Run the Groth16 pairing check; any failure mode collapses into the
    /// operation's error.
    fn check(
        &self,
        vk: &VerifyingKey<Bn254>,
        inputs: &[Fr],
        proof_bytes: &[u8],
        failure: VerifyError,
    ) -> Result<(), VerifyError> {
        let proof = match ZkProof::from_bytes(proof_bytes) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(reason = %e, "proof blob rejected");
                return Err(failure);
            }
        };

        let ark_proof = match proof.to_ark_proof() {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(reason = %e, "proof deserialization failed");
                return Err(failure);
            }
        };

        match Groth16::<Bn254>::verify(vk, inputs, &ark_proof) {
            Ok(true) => Ok(()),
            Ok(false) => Err(failure),
            Err(e) => {
                tracing::debug!(reason = %e, "verification algorithm failed");
                Err(failure)
            }
        }
    }

    /// Serialize all five verifying keys for distribution to validators.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for vk in [
            &self.mint_vk,
            &self.send_vk,
            &self.deposit_vk,
            &self.redeem_vk,
            &self.update_vk,
        ] {
            let mut vk_bytes = Vec::new();
            vk.serialize_compressed(&mut vk_bytes)
                .expect("VK serialization must not fail");
            buf.extend_from_slice(&(vk_bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(&vk_bytes);
        }
        buf
    }

    /// Deserialize a verifier from distribution bytes.
    pub fn from_bytes(data: &[u8]) -> anyhow::Result<Self> {
        let mut rest = data;
        let mut keys = Vec::with_capacity(5);
        for _ in 0..5 {
            if rest.len() < 4 {
                anyhow::bail!("truncated verifier key set");
            }
            let len = u32::from_be_bytes(rest[..4].try_into().unwrap()) as usize;
            rest = &rest[4..];
            if rest.len() < len {
                anyhow::bail!("truncated verifying key");
            }
            let vk = VerifyingKey::<Bn254>::deserialize_compressed(&rest[..len])
                .map_err(|e| anyhow::anyhow!("verifying key deserialization failed: {}", e))?;
            keys.push(vk);
            rest = &rest[len..];
        }
        if !rest.is_empty() {
            anyhow::bail!("trailing bytes after verifier key set");
        }

        let update_vk = keys.pop().expect("five keys");
        let redeem_vk = keys.pop().expect("five keys");
        let deposit_vk = keys.pop().expect("five keys");
        let send_vk = keys.pop().expect("five keys");
        let mint_vk = keys.pop().expect("five keys");

        Ok(Self::from_keys(
            mint_vk, send_vk, deposit_vk, redeem_vk, update_vk,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;
    use crate::zk::prover::TransferProver;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    fn setup() -> (TransferProver, TransferVerifier) {
        let mut rng = StdRng::seed_from_u64(42);
        TransferProver::setup(&mut rng)
    }

    #[test]
    fn valid_mint_proof_verifies() {
        let (prover, verifier) = setup();
        let old = keccak256(b"old balance");
        let sn = keccak256(b"serial");
        let cmt = keccak256(b"new balance");

        let proof = prover.prove_mint(&old, &sn, &cmt, 100).unwrap();
        verifier
            .verify_mint(&old, &sn, &cmt, 100, &proof.to_bytes())
            .expect("valid mint proof must verify");
    }

    #[test]
    fn mint_proof_bound_to_value() {
        let (prover, verifier) = setup();
        let old = keccak256(b"old balance");
        let sn = keccak256(b"serial");
        let cmt = keccak256(b"new balance");

        let proof = prover.prove_mint(&old, &sn, &cmt, 100).unwrap();
        assert_eq!(
            verifier.verify_mint(&old, &sn, &cmt, 101, &proof.to_bytes()),
            Err(VerifyError::InvalidMintProof),
            "proof for a different value must not verify"
        );
    }

    #[test]
    fn mint_proof_bound_to_commitment() {
        let (prover, verifier) = setup();
        let old = keccak256(b"old balance");
        let sn = keccak256(b"serial");
        let cmt = keccak256(b"new balance");

        let proof = prover.prove_mint(&old, &sn, &cmt, 100).unwrap();
        assert_eq!(
            verifier.verify_mint(&old, &sn, &keccak256(b"other"), 100, &proof.to_bytes()),
            Err(VerifyError::InvalidMintProof),
        );
    }

    #[test]
    fn garbage_proof_fails_with_operation_error() {
        let (_, verifier) = setup();
        let h = keccak256(b"h");
        assert_eq!(
            verifier.verify_send(&h, &h, &[0xAB; 40], &h, &h),
            Err(VerifyError::InvalidSendProof),
        );
    }

    #[test]
    fn proofs_do_not_cross_operations() {
        // A mint proof must not satisfy the redeem statement even though
        // both statements have the same arity.
        let (prover, verifier) = setup();
        let old = keccak256(b"old");
        let sn = keccak256(b"sn");
        let cmt = keccak256(b"cmt");

        let mint_proof = prover.prove_mint(&old, &sn, &cmt, 5).unwrap();
        assert_eq!(
            verifier.verify_redeem(&old, &sn, &cmt, 5, &mint_proof.to_bytes()),
            Err(VerifyError::InvalidRedeemProof),
        );
    }

    #[test]
    fn verifier_serialization_round_trip() {
        let (prover, verifier) = setup();
        let bytes = verifier.to_bytes();
        let restored = TransferVerifier::from_bytes(&bytes).unwrap();

        let old = keccak256(b"old");
        let sn = keccak256(b"sn");
        let cmt = keccak256(b"cmt");
        let proof = prover.prove_mint(&old, &sn, &cmt, 9).unwrap();

        restored
            .verify_mint(&old, &sn, &cmt, 9, &proof.to_bytes())
            .expect("restored verifier must accept valid proofs");
    }
}
