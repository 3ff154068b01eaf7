//! Wallet-side note records
//!
//! A [`Txo`] is a received commitment the wallet can prove ownership of.
//! Storage and spend planning live outside this crate; the builder only
//! reads these records.

use alloy_primitives::B256;
use ark_bls12_381::Fr;

use crate::error::{PrivacyError, Result};
use crate::note::{NoteRandom, ShieldNote, TransactNote};
use crate::nullifier::derive_nullifier;
use crate::token::TokenData;

/// Note variants a wallet can spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendableNote {
    Shield(ShieldNote),
    Transact(TransactNote),
}

impl SpendableNote {
    pub fn value(&self) -> u128 {
        match self {
            Self::Shield(n) => n.value,
            Self::Transact(n) => n.value,
        }
    }

    pub fn random(&self) -> &NoteRandom {
        match self {
            Self::Shield(n) => &n.random,
            Self::Transact(n) => &n.random,
        }
    }

    pub fn token(&self) -> &TokenData {
        match self {
            Self::Shield(n) => &n.token,
            Self::Transact(n) => &n.token,
        }
    }

    pub fn hash(&self) -> Fr {
        match self {
            Self::Shield(n) => n.hash(),
            Self::Transact(n) => n.hash(),
        }
    }
}

/// Unspent (or spent) transaction output owned by this wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Txo {
    pub tree: u32,
    pub position: u64,
    pub txid: B256,
    pub timestamp: Option<u64>,
    pub spend_txid: Option<B256>,
    pub note: SpendableNote,
}

impl Txo {
    pub fn is_spent(&self) -> bool {
        self.spend_txid.is_some()
    }

    pub fn nullifier(&self, nullifying_key: &Fr) -> Fr {
        derive_nullifier(nullifying_key, self.position)
    }
}

/// Output this wallet sent to someone else
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommitment {
    pub tree: u32,
    pub position: u64,
    pub txid: B256,
    pub timestamp: Option<u64>,
    pub note: TransactNote,
}

/// Total value of `txos`, failing on overflow
pub fn total_spend(txos: &[Txo]) -> Result<u128> {
    txos.iter().try_fold(0u128, |acc, txo| {
        acc.checked_add(txo.note.value())
            .ok_or(PrivacyError::ValueOverflow)
    })
}
