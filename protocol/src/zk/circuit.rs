//! # Input-Binding R1CS Circuit
//!
//! The production constraint systems for the five confidential operations
//! are compiled by the external proving toolchain; the chain only ever
//! sees their verifying keys. What this module provides is the
//! *input-binding* circuit used by the local development ceremony
//! ([`super::prover::TransferProver::setup`]): a minimal constraint system
//! whose only job is to fix the ordered public-input vector of each
//! statement, so locally-minted proofs verify against exactly one
//! `(commitment, serial, root, value)` assignment and nothing else.
//!
//! ## Shape
//!
//! For a statement with `n` public inputs the circuit allocates the `n`
//! inputs, one private witness equal to their sum, and a single equality
//! constraint tying them together. Groth16's verification equation then
//! binds any proof to the exact input vector it was generated for — a
//! proof replayed under different inputs fails the pairing check.

use ark_bn254::Fr;
use ark_r1cs_std::{
    alloc::AllocVar,
    eq::EqGadget,
    fields::{fp::FpVar, FieldVar},
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

// ---------------------------------------------------------------------------
// Circuit definition
// ---------------------------------------------------------------------------

/// Binds an ordered vector of public inputs.
///
/// All slots are `Option<Fr>` so the same struct serves both key
/// generation (where only the constraint topology matters and every slot
/// is `None`) and proving (where every slot is assigned).
#[derive(Clone)]
pub struct StatementCircuit {
    /// The public inputs, in verifier order.
    pub inputs: Vec<Option<Fr>>,
}

impl StatementCircuit {
    /// A fully-assigned circuit for proof generation.
    pub fn new(inputs: Vec<Fr>) -> Self {
        Self {
            inputs: inputs.into_iter().map(Some).collect(),
        }
    }

    /// A blank circuit with the given arity (for CRS generation).
    pub fn blank(arity: usize) -> Self {
        Self {
            inputs: vec![None; arity],
        }
    }
}

// ---------------------------------------------------------------------------
// Constraint synthesizer
// ---------------------------------------------------------------------------

impl ConstraintSynthesizer<Fr> for StatementCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Concrete sum of the assigned inputs, when proving. In key-gen
        // mode any missing slot leaves the witness unassigned.
        let mut concrete: Option<Fr> = Some(Fr::from(0u64));
        for slot in &self.inputs {
            concrete = match (concrete, slot) {
                (Some(acc), Some(v)) => Some(acc + v),
                _ => None,
            };
        }

        // Allocate the public inputs and accumulate them symbolically.
        let mut acc = FpVar::<Fr>::zero();
        for slot in self.inputs {
            let input = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "statement_input"), || {
                slot.ok_or(SynthesisError::AssignmentMissing)
            })?;
            acc += input;
        }

        // One private witness pinned to the input sum.
        let binder = FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "binder"), || {
            concrete.ok_or(SynthesisError::AssignmentMissing)
        })?;

        acc.enforce_equal(&binder)?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn assigned_circuit_is_satisfied() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let circuit = StatementCircuit::new(vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)]);
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn blank_and_assigned_share_topology() {
        let blank_cs = ConstraintSystem::<Fr>::new_ref();
        StatementCircuit::blank(4)
            .generate_constraints(blank_cs.clone())
            .unwrap_err(); // blank assignment must report AssignmentMissing

        let assigned_cs = ConstraintSystem::<Fr>::new_ref();
        StatementCircuit::new(vec![Fr::from(7u64); 4])
            .generate_constraints(assigned_cs.clone())
            .unwrap();

        // Four inputs plus the constant one.
        assert_eq!(assigned_cs.num_instance_variables(), 5);
    }
}
