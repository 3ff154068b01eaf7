//! Bound Parameters
//!
//! Non-secret transaction fields hashed into a public circuit input:
//!
//! ```text
//! boundParamsHash = keccak256(abi.encode(BoundParams)) mod p
//! ```
//!
//! Field order and widths follow the verifying circuit exactly. Changing any
//! field after hashing invalidates the proof.

use alloy_primitives::{Address, B256, aliases::U72, keccak256};
use alloy_sol_types::SolValue;
use ark_bls12_381::Fr;
use serde::{Deserialize, Serialize};
use shadepool_config::{ChainConfig, ContractsConfig};

use crate::abi;
use crate::codec::{CommitmentCiphertext, encode_commitment_ciphertext};
use crate::error::{PrivacyError, Result};
use crate::hash::fr_from_bytes;

/// Exit mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnshieldFlag {
    #[default]
    None = 0,
    Unshield = 1,
    Override = 2,
}

/// Ledger network a transaction is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chain {
    pub kind: u8,
    pub id: u64,
}

impl Chain {
    /// Network id used as `chainID` in bound params: `(kind << 56) + id`.
    /// `id` must fit in the low 56 bits.
    pub fn full_network_id(&self) -> Result<u64> {
        if self.id >> 56 != 0 {
            return Err(PrivacyError::ValueOverflow);
        }
        Ok((u64::from(self.kind) << 56) | self.id)
    }
}

impl From<&ChainConfig> for Chain {
    fn from(config: &ChainConfig) -> Self {
        Self {
            kind: config.kind,
            id: config.id,
        }
    }
}

/// Contract allowed to act on the transaction after verification, plus
/// the binding hash of what it will do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdaptId {
    pub contract: Address,
    pub parameters: B256,
}

impl AdaptId {
    /// Bind `parameters` to the relay adapt contract from configuration
    pub fn relay_adapt(contracts: &ContractsConfig, parameters: B256) -> Result<Self> {
        let contract = contracts
            .relay_adapt
            .parse::<Address>()
            .map_err(|_| PrivacyError::InvalidAddress(contracts.relay_adapt.clone()))?;
        Ok(Self {
            contract,
            parameters,
        })
    }
}

/// In-memory bound parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundParams {
    pub tree_number: u16,
    pub min_gas_price: u128,
    pub unshield: UnshieldFlag,
    pub chain_id: u64,
    pub adapt_contract: Address,
    pub adapt_params: B256,
    pub commitment_ciphertext: Vec<CommitmentCiphertext>,
}

impl BoundParams {
    pub fn to_abi(&self) -> Result<abi::BoundParams> {
        Ok(abi::BoundParams {
            treeNumber: self.tree_number,
            minGasPrice: U72::try_from(self.min_gas_price).map_err(|_| PrivacyError::ValueOverflow)?,
            unshield: self.unshield as u8,
            chainID: self.chain_id,
            adaptContract: self.adapt_contract,
            adaptParams: self.adapt_params,
            commitmentCiphertext: self
                .commitment_ciphertext
                .iter()
                .map(encode_commitment_ciphertext)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    pub fn hash(&self) -> Result<Fr> {
        Ok(hash_bound_params(&self.to_abi()?))
    }
}

/// keccak256 of the ABI-encoded params, reduced into the scalar field
pub fn hash_bound_params(params: &abi::BoundParams) -> Fr {
    fr_from_bytes(keccak256(params.abi_encode()).as_slice())
}
