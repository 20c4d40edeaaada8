//! # Proof Generation
//!
//! The wallet-side half of the proof system: per-operation Groth16 proving
//! keys plus the local setup ceremony. The workflow is:
//!
//! 1. **Setup** — [`TransferProver::setup`] runs `circuit_specific_setup`
//!    once per operation and hands back the prover and the matching
//!    [`TransferVerifier`]. This is a single-party ceremony suitable for
//!    development networks and tests; production deployments distribute
//!    MPC-generated keys instead and never construct a prover on-node.
//! 2. **Prove** — `prove_*` assembles the operation's public-input vector
//!    (identical derivation to the verifier) and invokes `Groth16::prove`.
//!
//! Proofs are ~128 bytes compressed. Generation cost for the dev circuit
//! is negligible; production circuits pay seconds, which is why proving
//! always happens client-side, never on the consensus thread.

use anyhow::{Context, Result};
use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, Rng};

use crate::crypto::hash::Hash;
use crate::crypto::keys::OneTimeKey;

use super::circuit::StatementCircuit;
use super::proof::ZkProof;
use super::verifier::{
    deposit_public_inputs, mint_public_inputs, redeem_public_inputs, send_public_inputs,
    update_public_inputs, TransferVerifier,
};
use super::{DEPOSIT_INPUTS, MINT_INPUTS, REDEEM_INPUTS, SEND_INPUTS, UPDATE_INPUTS};

// ---------------------------------------------------------------------------
// TransferProver
// ---------------------------------------------------------------------------

/// Holds the five Groth16 proving keys, one per confidential operation.
///
/// Proving keys are large but immutable; create one prover per process and
/// keep it for the lifetime of the wallet.
pub struct TransferProver {
    mint_pk: ProvingKey<Bn254>,
    send_pk: ProvingKey<Bn254>,
    deposit_pk: ProvingKey<Bn254>,
    redeem_pk: ProvingKey<Bn254>,
    update_pk: ProvingKey<Bn254>,
}

impl TransferProver {
    /// Run the local trusted-setup ceremony for all five operations.
    ///
    /// Returns both halves; the verifier side is what a development chain
    /// loads into its handler.
    ///
    /// # Panics
    ///
    /// Panics if CRS generation fails, which would indicate a malformed
    /// circuit rather than a recoverable condition.
    pub fn setup<R: Rng + CryptoRng>(rng: &mut R) -> (Self, TransferVerifier) {
        let (mint_pk, mint_vk) = Self::op_setup(MINT_INPUTS, rng);
        let (send_pk, send_vk) = Self::op_setup(SEND_INPUTS, rng);
        let (deposit_pk, deposit_vk) = Self::op_setup(DEPOSIT_INPUTS, rng);
        let (redeem_pk, redeem_vk) = Self::op_setup(REDEEM_INPUTS, rng);
        let (update_pk, update_vk) = Self::op_setup(UPDATE_INPUTS, rng);

        let prover = Self {
            mint_pk,
            send_pk,
            deposit_pk,
            redeem_pk,
            update_pk,
        };
        let verifier =
            TransferVerifier::from_keys(mint_vk, send_vk, deposit_vk, redeem_vk, update_vk);

        (prover, verifier)
    }

    fn op_setup<R: Rng + CryptoRng>(
        arity: usize,
        rng: &mut R,
    ) -> (ProvingKey<Bn254>, VerifyingKey<Bn254>) {
        Groth16::<Bn254>::circuit_specific_setup(StatementCircuit::blank(arity), rng)
            .expect("Groth16 setup must succeed for a well-formed circuit")
    }

    /// Prove a Mint statement.
    pub fn prove_mint(
        &self,
        old_balance: &Hash,
        serial: &Hash,
        commitment: &Hash,
        value: u64,
    ) -> Result<ZkProof> {
        self.prove(
            &self.mint_pk,
            mint_public_inputs(old_balance, serial, commitment, value),
        )
    }

    /// Prove a Send statement.
    pub fn prove_send(
        &self,
        serial: &Hash,
        transfer_commitment: &Hash,
        old_balance: &Hash,
        commitment: &Hash,
    ) -> Result<ZkProof> {
        self.prove(
            &self.send_pk,
            send_public_inputs(serial, transfer_commitment, old_balance, commitment),
        )
    }

    /// Prove a Deposit statement.
    pub fn prove_deposit(
        &self,
        one_time_key: &OneTimeKey,
        root: &Hash,
        old_balance: &Hash,
        serial: &Hash,
        commitment: &Hash,
        sender_serial: &Hash,
    ) -> Result<ZkProof> {
        self.prove(
            &self.deposit_pk,
            deposit_public_inputs(
                one_time_key,
                root,
                old_balance,
                serial,
                commitment,
                sender_serial,
            ),
        )
    }

    /// Prove a Redeem statement.
    pub fn prove_redeem(
        &self,
        old_balance: &Hash,
        serial: &Hash,
        commitment: &Hash,
        value: u64,
    ) -> Result<ZkProof> {
        self.prove(
            &self.redeem_pk,
            redeem_public_inputs(old_balance, serial, commitment, value),
        )
    }

    /// Prove an Update statement.
    pub fn prove_update(
        &self,
        old_balance: &Hash,
        root: &Hash,
        commitment: &Hash,
    ) -> Result<ZkProof> {
        self.prove(
            &self.update_pk,
            update_public_inputs(old_balance, root, commitment),
        )
    }

    fn prove(&self, pk: &ProvingKey<Bn254>, inputs: Vec<Fr>) -> Result<ZkProof> {
        let circuit = StatementCircuit::new(inputs);

        let mut rng = ark_std::rand::thread_rng();
        let proof = Groth16::<Bn254>::prove(pk, circuit, &mut rng)
            .context("Groth16 proof generation failed")?;

        ZkProof::from_ark_proof(&proof)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;
    use crate::crypto::keys::Keypair;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn every_operation_proves_and_verifies() {
        let mut rng = StdRng::seed_from_u64(7);
        let (prover, verifier) = TransferProver::setup(&mut rng);

        let old = keccak256(b"old");
        let sn = keccak256(b"sn");
        let sns = keccak256(b"sns");
        let cmt = keccak256(b"cmt");
        let cmts = keccak256(b"cmts");
        let root = keccak256(b"root");
        let otk = Keypair::generate().public_key().one_time_key();

        let p = prover.prove_mint(&old, &sn, &cmt, 10).unwrap();
        verifier
            .verify_mint(&old, &sn, &cmt, 10, &p.to_bytes())
            .unwrap();

        let p = prover.prove_send(&sn, &cmts, &old, &cmt).unwrap();
        verifier
            .verify_send(&sn, &cmts, &p.to_bytes(), &old, &cmt)
            .unwrap();

        let p = prover
            .prove_deposit(&otk, &root, &old, &sn, &cmt, &sns)
            .unwrap();
        verifier
            .verify_deposit(&otk, &root, &old, &sn, &cmt, &sns, &p.to_bytes())
            .unwrap();

        let p = prover.prove_redeem(&old, &sn, &cmt, 10).unwrap();
        verifier
            .verify_redeem(&old, &sn, &cmt, 10, &p.to_bytes())
            .unwrap();

        let p = prover.prove_update(&old, &root, &cmt).unwrap();
        verifier
            .verify_update(&old, &root, &cmt, &p.to_bytes())
            .unwrap();
    }

    #[test]
    fn proof_size_is_compact() {
        let mut rng = StdRng::seed_from_u64(7);
        let (prover, _) = TransferProver::setup(&mut rng);
        let h = keccak256(b"h");
        let proof = prover.prove_mint(&h, &h, &h, 1).unwrap();
        assert!(proof.size() <= 256, "compressed Groth16 proofs are small");
    }
}
