//! Shadepool Privacy SDK
//!
//! Transaction construction and note commitments for a shielded pool on a
//! public ledger.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Shielded Transaction                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │  Nullifiers  │  │ Commitments  │  │ Commitment Ciphertext │ │
//! │  │  (spent)     │  │  (new notes) │  │ (blinded, per output) │ │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘ │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Bound Params Hash ◄── adaptParams          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                           │                                     │
//! │                           ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              ZK Proof (external prover)                  │   │
//! │  │  • Valid nullifier derivation                            │   │
//! │  │  • Valid commitment structure                            │   │
//! │  │  • Balance preservation: Σ inputs = Σ outputs            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! In the other direction, [`events`] turns ledger logs back into wallet
//! records and [`note::TransactNote::decrypt`] opens received outputs.

pub mod abi;
pub mod bound_params;
pub mod codec;
pub mod encryption;
pub mod error;
pub mod events;
pub mod hash;
pub mod keys;
pub mod memo;
pub mod merkle;
pub mod note;
pub mod nullifier;
pub mod prover;
pub mod relay;
pub mod token;
pub mod transaction;
pub mod txo;

pub use bound_params::{AdaptId, BoundParams, Chain, UnshieldFlag, hash_bound_params};
pub use codec::{CommitmentCiphertext, pack_ciphertext, unpack_ciphertext};
pub use encryption::Ciphertext;
pub use error::{ErrorKind, PrivacyError, Result};
pub use events::{RawLog, ShieldLog, ShieldLogShape};
pub use keys::{AddressKeys, SpendingPublicKey, ViewingKeyPair, WalletKeyContext, WalletKeys};
pub use memo::{MEMO_SENDER_RANDOM_NULL, OutputType, SenderRandom};
pub use merkle::{MERKLE_TREE_DEPTH, MemoryMerkleTree, MerkleTreeService, MerkleWitness};
pub use note::{
    ExitData, Note, ShieldNote, TransactNote, UnshieldNote, derive_commitment_hash,
    derive_note_public_key,
};
pub use nullifier::derive_nullifier;
pub use prover::{PrivateInputs, Proof, Prover, PublicInputs, TransactionRequest};
pub use relay::{BalanceOracle, ContractCall, compute_action_binding_hash};
pub use token::{ENTIRE_BALANCE, ERC721_NOTE_VALUE, TokenData, TokenType};
pub use transaction::{MAX_TRANSFER_OUTPUTS, ProvedTransaction, Transaction, UnprovedTransaction};
pub use txo::{SpendableNote, Txo};
