//! Token Identity
//!
//! A note's currency is a `(kind, contract, subID)` triple. Equality and
//! lookup go through the token hash:
//!
//! ```text
//! ERC20:          tokenHash = address (left-padded to 32 bytes)
//! ERC721/ERC1155: tokenHash = keccak256(abi.encode(kind, address, subID)) mod p
//! ```

use alloy_primitives::{Address, U256, keccak256};
use alloy_sol_types::SolValue;
use ark_bls12_381::Fr;
use serde::{Deserialize, Serialize};

use crate::abi;
use crate::error::{PrivacyError, Result};
use crate::hash::{fr_from_bytes, fr_to_bytes};

/// Value of every ERC721 note: one whole unique unit
pub const ERC721_NOTE_VALUE: u128 = 1;

/// Protocol sentinel: a value of zero asks the contract to move the entire
/// held balance of the token
pub const ENTIRE_BALANCE: u128 = 0;

/// Token standard of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenType {
    Erc20 = 0,
    Erc721 = 1,
    Erc1155 = 2,
}

impl TryFrom<u8> for TokenType {
    type Error = PrivacyError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Erc20),
            1 => Ok(Self::Erc721),
            2 => Ok(Self::Erc1155),
            other => Err(PrivacyError::UnsupportedTokenKind(other)),
        }
    }
}

/// Token identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenData {
    pub token_type: TokenType,
    pub token_address: Address,
    pub token_sub_id: U256,
}

impl TokenData {
    /// Fungible token at `token_address`
    pub fn erc20(token_address: Address) -> Self {
        Self {
            token_type: TokenType::Erc20,
            token_address,
            token_sub_id: U256::ZERO,
        }
    }

    /// Any token kind; fungible tokens must carry a zero sub ID
    pub fn new(token_type: TokenType, token_address: Address, token_sub_id: U256) -> Result<Self> {
        if token_type == TokenType::Erc20 && !token_sub_id.is_zero() {
            return Err(PrivacyError::InvalidTokenSubId);
        }
        Ok(Self {
            token_type,
            token_address,
            token_sub_id,
        })
    }

    pub fn is_nft(&self) -> bool {
        self.token_type != TokenType::Erc20
    }

    /// Canonical token hash used as the note's token field
    pub fn hash(&self) -> Fr {
        match self.token_type {
            TokenType::Erc20 => fr_from_bytes(self.token_address.into_word().as_slice()),
            TokenType::Erc721 | TokenType::Erc1155 => {
                fr_from_bytes(keccak256(self.to_abi().abi_encode()).as_slice())
            }
        }
    }

    /// Recover a fungible token from its hash; NFT hashes are not invertible
    pub fn from_fungible_hash(hash: &Fr) -> Option<Self> {
        let bytes = fr_to_bytes(hash);
        if bytes[..12].iter().any(|b| *b != 0) {
            return None;
        }
        Some(Self::erc20(Address::from_slice(&bytes[12..])))
    }

    pub fn to_abi(&self) -> abi::TokenData {
        abi::TokenData {
            tokenType: self.token_type as u8,
            tokenAddress: self.token_address,
            tokenSubID: self.token_sub_id,
        }
    }

    pub fn from_abi(token: &abi::TokenData) -> Result<Self> {
        let token_type = TokenType::try_from(token.tokenType)?;
        Self::new(token_type, token.tokenAddress, token.tokenSubID)
    }
}
