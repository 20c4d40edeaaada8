//! # Proof Blob Wrapper
//!
//! A [`ZkProof`] is the compressed Groth16 proof attached to a
//! confidential transaction. The wrapper enforces the protocol's proof
//! ceiling and validates that the bytes actually decode to a proof before
//! anything downstream touches them — the pairing check never sees
//! malformed input.

use anyhow::{Context, Result};
use ark_bn254::Bn254;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::config::MAX_PROOF_BYTES;

/// A serialized Groth16 proof for one of the confidential operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZkProof {
    bytes: Vec<u8>,
}

impl ZkProof {
    /// Raw compressed proof bytes (what travels in the transaction).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Reconstruct a proof from compressed bytes.
    ///
    /// Rejects blobs over [`MAX_PROOF_BYTES`] before attempting to decode,
    /// and rejects bytes that do not deserialize to a valid proof.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_PROOF_BYTES {
            anyhow::bail!(
                "proof blob of {} bytes exceeds the {} byte ceiling",
                data.len(),
                MAX_PROOF_BYTES
            );
        }

        let _proof = ark_groth16::Proof::<Bn254>::deserialize_compressed(data)
            .context("invalid Groth16 proof bytes")?;

        Ok(Self {
            bytes: data.to_vec(),
        })
    }

    /// Wrap an arkworks proof (used by the prover).
    pub(crate) fn from_ark_proof(proof: &ark_groth16::Proof<Bn254>) -> Result<Self> {
        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .context("proof serialization failed")?;
        Ok(Self { bytes })
    }

    /// Deserialize into the arkworks proof struct (used by the verifier).
    pub(crate) fn to_ark_proof(&self) -> Result<ark_groth16::Proof<Bn254>> {
        ark_groth16::Proof::<Bn254>::deserialize_compressed(&self.bytes[..])
            .map_err(|e| anyhow::anyhow!("proof deserialization failed: {}", e))
    }

    /// Size of the proof in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(ZkProof::from_bytes(&[0xFF; 64]).is_err());
    }

    #[test]
    fn oversized_blob_is_rejected_before_decoding() {
        let blob = vec![0u8; MAX_PROOF_BYTES + 1];
        let err = ZkProof::from_bytes(&blob).unwrap_err();
        assert!(err.to_string().contains("ceiling"));
    }
}
