//! Relay Adapt Binding
//!
//! A relay batch runs auxiliary contract calls after its transactions verify.
//! The calls are bound into every proof through `adaptParams`:
//!
//! ```text
//! adaptParams = keccak256(abi.encode(
//!     bytes32[][] nullifiers,   // one list per transaction
//!     uint256 transactionCount,
//!     (bytes31 random, bool requireSuccess, uint256 minGasLimit,
//!      (address to, bytes data, uint256 value)[] calls)
//! ))
//! ```
//!
//! Swapping, reordering or adding calls after proving changes the hash and
//! breaks verification.

use std::future::Future;

use alloy_primitives::{Address, B256, Bytes, FixedBytes, U256, keccak256};
use alloy_sol_types::SolValue;
use futures::future::try_join_all;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::abi;
use crate::error::{PrivacyError, Result};
use crate::keys::AddressKeys;
use crate::note::ShieldNote;
use crate::token::{ENTIRE_BALANCE, ERC721_NOTE_VALUE, TokenData, TokenType};

/// Exact length of the relay random tag
pub const RELAY_RANDOM_LENGTH: usize = 31;

/// A populated contract call. Only `to`, `data` and `value` are bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub from: Option<Address>,
    pub gas_limit: Option<u64>,
    pub nonce: Option<u64>,
}

/// Strip calls down to the bound fields
pub fn format_calls(calls: &[ContractCall]) -> Vec<abi::Call> {
    calls
        .iter()
        .map(|call| abi::Call {
            to: call.to,
            data: call.data.clone(),
            value: call.value,
        })
        .collect()
}

pub fn format_random(random: &[u8]) -> Result<FixedBytes<RELAY_RANDOM_LENGTH>> {
    if random.len() != RELAY_RANDOM_LENGTH {
        return Err(PrivacyError::InvalidTagLength(random.len()));
    }
    Ok(FixedBytes::from_slice(random))
}

/// Fresh random tag for a relay batch
pub fn generate_relay_random() -> [u8; RELAY_RANDOM_LENGTH] {
    let mut random = [0u8; RELAY_RANDOM_LENGTH];
    rand::thread_rng().fill_bytes(&mut random);
    random
}

pub fn action_data(
    random: &[u8],
    require_success: bool,
    calls: &[ContractCall],
    min_gas_limit: U256,
) -> Result<abi::ActionData> {
    Ok(abi::ActionData {
        random: format_random(random)?,
        requireSuccess: require_success,
        minGasLimit: min_gas_limit,
        calls: format_calls(calls),
    })
}

/// Binding hash over per-transaction nullifier lists and the action
pub fn compute_action_binding_hash(
    nullifiers: &[Vec<B256>],
    random: &[u8],
    require_success: bool,
    calls: &[ContractCall],
    min_gas_limit: U256,
) -> Result<B256> {
    let action = action_data(random, require_success, calls, min_gas_limit)?;
    let preimage = (
        nullifiers.to_vec(),
        U256::from(nullifiers.len()),
        action,
    )
        .abi_encode_params();
    Ok(keccak256(preimage))
}

/// [`compute_action_binding_hash`] over dummy-proved or proved transactions
pub fn relay_adapt_params(
    transactions: &[abi::Transaction],
    random: &[u8],
    require_success: bool,
    calls: &[ContractCall],
    min_gas_limit: U256,
) -> Result<B256> {
    let nullifiers: Vec<Vec<B256>> = transactions
        .iter()
        .map(|tx| tx.nullifiers.clone())
        .collect();
    compute_action_binding_hash(&nullifiers, random, require_success, calls, min_gas_limit)
}

/// Public token balances, used to resolve [`ENTIRE_BALANCE`]
pub trait BalanceOracle {
    fn balance_of(
        &self,
        owner: Address,
        token: &TokenData,
    ) -> impl Future<Output = anyhow::Result<u128>>;
}

/// Concrete amount for `value`, asking the oracle when it is the
/// [`ENTIRE_BALANCE`] sentinel
pub async fn resolve_value<B: BalanceOracle>(
    oracle: &B,
    owner: Address,
    token: &TokenData,
    value: u128,
) -> Result<u128> {
    if value != ENTIRE_BALANCE {
        return Ok(value);
    }
    oracle
        .balance_of(owner, token)
        .await
        .map_err(|e| PrivacyError::BalanceLookup(e.to_string()))
}

/// Resolve many values concurrently, preserving order
pub async fn resolve_values<B: BalanceOracle>(
    oracle: &B,
    owner: Address,
    requests: &[(TokenData, u128)],
) -> Result<Vec<u128>> {
    try_join_all(
        requests
            .iter()
            .map(|(token, value)| resolve_value(oracle, owner, token, *value)),
    )
    .await
}

/// Shield value for an NFT received by the relay contract.
///
/// Fungible tokens go through the fungible list and are rejected here.
pub fn value_for_nft_shield(token: &TokenData) -> Result<u128> {
    match token.token_type {
        TokenType::Erc721 => Ok(ERC721_NOTE_VALUE),
        TokenType::Erc1155 => Ok(ENTIRE_BALANCE),
        TokenType::Erc20 => Err(PrivacyError::UnsupportedTokenKind(TokenType::Erc20 as u8)),
    }
}

/// Shield requests returning relay-held tokens to the pool.
///
/// Fungible tokens and ERC1155 shield their entire relay balance; every
/// request gets its own random shield key.
pub fn generate_relay_shield_requests(
    random: &[u8],
    fungible: &[(Address, AddressKeys)],
    nfts: &[(TokenData, AddressKeys)],
) -> Result<Vec<abi::ShieldRequest>> {
    let fungible = fungible
        .iter()
        .map(|(token_address, receiver)| (TokenData::erc20(*token_address), ENTIRE_BALANCE, receiver));
    let nfts = nfts
        .iter()
        .map(|(token, receiver)| Ok((token.clone(), value_for_nft_shield(token)?, receiver)))
        .collect::<Result<Vec<_>>>()?;

    fungible
        .chain(nfts)
        .map(|(token, value, receiver)| {
            let note = ShieldNote::new(receiver.master_public_key, random, value, token)?;
            let mut shield_private_key = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut shield_private_key);
            note.serialize(&shield_private_key, &receiver.viewing_public_key)
        })
        .collect()
}
