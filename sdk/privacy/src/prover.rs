//! Prover Interface
//!
//! Circuit inputs handed to the external proving backend, and the proof it
//! returns.
//!
//! ```text
//! Public inputs:   merkleRoot, boundParamsHash, nullifiers[], commitmentsOut[]
//! Private inputs:  tokenHash, randomIn[], valueIn[], pathElements[][],
//!                  leavesIndices[], valueOut[], spendingPub, npkOut[],
//!                  nullifyingKey
//! ```
//!
//! Index `i` of every input-side array describes the same spent note, and
//! index `j` of every output-side array the same output.

use std::future::Future;

use alloy_primitives::U256;
use ark_bls12_381::Fr;

use crate::abi;
use crate::bound_params::BoundParams;
use crate::keys::SpendingPublicKey;

/// Circuit public inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicInputs {
    pub merkle_root: Fr,
    pub bound_params_hash: Fr,
    pub nullifiers: Vec<Fr>,
    pub commitments_out: Vec<Fr>,
}

/// Circuit private inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateInputs {
    pub token_hash: Fr,
    pub random_in: Vec<Fr>,
    pub value_in: Vec<u128>,
    pub path_elements: Vec<Vec<Fr>>,
    pub leaves_indices: Vec<u64>,
    pub value_out: Vec<u128>,
    pub public_key: SpendingPublicKey,
    pub npk_out: Vec<Fr>,
    pub nullifying_key: Fr,
}

/// Everything the prover needs for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub public_inputs: PublicInputs,
    pub private_inputs: PrivateInputs,
    pub bound_params: BoundParams,
}

/// Groth16 proof in prover coordinate order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Proof {
    pub pi_a: [U256; 2],
    pub pi_b: [[U256; 2]; 2],
    pub pi_c: [U256; 2],
}

impl Proof {
    /// Structurally valid proof that never verifies
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Proving backend
pub trait Prover {
    /// Generate a proof, reporting progress in `[0, 1]`
    fn prove(
        &self,
        request: &TransactionRequest,
        on_progress: &mut dyn FnMut(f64),
    ) -> impl Future<Output = anyhow::Result<Proof>>;

    /// Placeholder proof for gas estimation
    fn dummy_prove(&self, _public_inputs: &PublicInputs) -> Proof {
        Proof::zero()
    }

    fn format_proof(&self, proof: &Proof) -> abi::SnarkProof {
        format_proof(proof)
    }
}

/// Ledger proof layout; G2 coordinates are stored in swapped order
pub fn format_proof(proof: &Proof) -> abi::SnarkProof {
    abi::SnarkProof {
        a: abi::G1Point {
            x: proof.pi_a[0],
            y: proof.pi_a[1],
        },
        b: abi::G2Point {
            x: [proof.pi_b[0][1], proof.pi_b[0][0]],
            y: [proof.pi_b[1][1], proof.pi_b[1][0]],
        },
        c: abi::G1Point {
            x: proof.pi_c[0],
            y: proof.pi_c[1],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_proof_swaps_g2() {
        let u = |n: u64| U256::from(n);
        let proof = Proof {
            pi_a: [u(1), u(2)],
            pi_b: [[u(3), u(4)], [u(5), u(6)]],
            pi_c: [u(7), u(8)],
        };
        let formatted = format_proof(&proof);
        assert_eq!(formatted.a.x, u(1));
        assert_eq!(formatted.b.x, [u(4), u(3)]);
        assert_eq!(formatted.b.y, [u(6), u(5)]);
        assert_eq!(formatted.c.y, u(8));
    }

    #[test]
    fn test_zero_proof() {
        let formatted = format_proof(&Proof::zero());
        assert_eq!(formatted.a.x, U256::ZERO);
        assert_eq!(formatted.b.y, [U256::ZERO; 2]);
    }
}
