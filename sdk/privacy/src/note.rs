//! Shielded Notes
//!
//! A note is value held privately in the pool. Notes appear in three
//! lifecycle variants sharing the same commitment scheme:
//!
//! ```text
//! notePublicKey  = NoteHash(masterPublicKey, random)         // shield, transact
//! commitment     = NoteHash(notePublicKey | address, tokenHash, value)
//! ```
//!
//! - [`ShieldNote`]: value entering the pool from a public address
//! - [`TransactNote`]: value moving between pool participants
//! - [`UnshieldNote`]: value leaving the pool to a public address

use alloy_primitives::{Address, B256, U256, aliases::U120};
use ark_bls12_381::Fr;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shadepool_config::BuilderConfig;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::abi;
use crate::codec::{CIPHERTEXT_DATA_BLOCKS, CommitmentCiphertext};
use crate::encryption::{Ciphertext, IV_LENGTH, decrypt_blocks, encrypt_blocks};
use crate::error::{PrivacyError, Result};
use crate::hash::{fr_from_bytes, fr_to_bytes, note_hash};
use crate::keys::{AddressKeys, ViewingKeyPair, WalletKeyContext, note_blinding_keys, shared_symmetric_key};
use crate::memo::{
    MEMO_SENDER_RANDOM_NULL, NoteAnnotationData, OutputType, SenderRandom, create_annotation_data,
    decode_memo_text, decrypt_annotation_data, encode_memo_text, sender_random_for,
};
use crate::token::{ERC721_NOTE_VALUE, TokenData, TokenType};

/// Length of a note random in bytes
pub const NOTE_RANDOM_LENGTH: usize = 16;

/// Wallet-chosen note entropy
pub type NoteRandom = [u8; NOTE_RANDOM_LENGTH];

const SHIELD_RECEIVER_MASK_CONTEXT: &str = "shadepool 2024 shield receiver key mask v1";

/// notePublicKey = NoteHash(masterPublicKey, random)
pub fn derive_note_public_key(master_public_key: &Fr, random: &[u8]) -> Result<Fr> {
    if random.len() != NOTE_RANDOM_LENGTH {
        return Err(PrivacyError::InvalidRandomLength {
            expected: NOTE_RANDOM_LENGTH,
            got: random.len(),
        });
    }
    Ok(note_hash(&[*master_public_key, fr_from_bytes(random)]))
}

/// commitment = NoteHash(notePublicKeyOrAddress, tokenHash, value)
pub fn derive_commitment_hash(note_public_key: &Fr, token_hash: &Fr, value: u128) -> Fr {
    note_hash(&[*note_public_key, *token_hash, Fr::from(value)])
}

/// A fresh random note entropy
pub fn random_note_random() -> NoteRandom {
    let mut random = [0u8; NOTE_RANDOM_LENGTH];
    rand::thread_rng().fill_bytes(&mut random);
    random
}

fn note_random_from(random: &[u8]) -> Result<NoteRandom> {
    random
        .try_into()
        .map_err(|_| PrivacyError::InvalidRandomLength {
            expected: NOTE_RANDOM_LENGTH,
            got: random.len(),
        })
}

fn ledger_value(value: u128) -> Result<U120> {
    U120::try_from(value).map_err(|_| PrivacyError::ValueOverflow)
}

fn xor32(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    core::array::from_fn(|i| a[i] ^ b[i])
}

// ============================================================================
// Shield
// ============================================================================

/// Note created when value enters the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldNote {
    pub master_public_key: Fr,
    pub random: NoteRandom,
    pub value: u128,
    pub token: TokenData,
}

impl ShieldNote {
    pub fn new(master_public_key: Fr, random: &[u8], value: u128, token: TokenData) -> Result<Self> {
        Ok(Self {
            master_public_key,
            random: note_random_from(random)?,
            value,
            token,
        })
    }

    pub fn note_public_key(&self) -> Fr {
        note_hash(&[self.master_public_key, fr_from_bytes(&self.random)])
    }

    pub fn hash(&self) -> Fr {
        derive_commitment_hash(&self.note_public_key(), &self.token.hash(), self.value)
    }

    /// Plaintext preimage published with the shield request
    pub fn preimage(&self) -> Result<abi::CommitmentPreimage> {
        Ok(abi::CommitmentPreimage {
            npk: B256::from(fr_to_bytes(&self.note_public_key())),
            token: self.token.to_abi(),
            value: ledger_value(self.value)?,
        })
    }

    /// Build the shield request for the pool contract.
    ///
    /// ```text
    /// bundle[0] = iv || tag
    /// bundle[1] = Enc(random) (16) || receiverIv (16)
    /// bundle[2] = receiverViewingPub XOR KDF(shieldPriv || receiverIv)
    /// shieldKey = X25519 public key of shieldPriv
    /// ```
    pub fn serialize(
        &self,
        shield_private_key: &[u8; 32],
        receiver_viewing_public_key: &[u8; 32],
    ) -> Result<abi::ShieldRequest> {
        let shield_secret = StaticSecret::from(*shield_private_key);
        let shield_key = PublicKey::from(&shield_secret);
        let shared_key = shared_symmetric_key(&shield_secret, receiver_viewing_public_key)?;

        let encrypted_random = encrypt_blocks(&[self.random.to_vec()], &shared_key)?;

        let mut receiver_iv = [0u8; IV_LENGTH];
        rand::thread_rng().fill_bytes(&mut receiver_iv);
        let masked_receiver = xor32(
            receiver_viewing_public_key,
            &receiver_key_mask(shield_private_key, &receiver_iv),
        );

        let mut head = [0u8; 32];
        head[..IV_LENGTH].copy_from_slice(&encrypted_random.iv);
        head[IV_LENGTH..].copy_from_slice(&encrypted_random.tag);

        let mut random_slot = [0u8; 32];
        random_slot[..NOTE_RANDOM_LENGTH].copy_from_slice(&encrypted_random.data[0]);
        random_slot[NOTE_RANDOM_LENGTH..].copy_from_slice(&receiver_iv);

        Ok(abi::ShieldRequest {
            preimage: self.preimage()?,
            ciphertext: abi::ShieldCiphertext {
                encryptedBundle: [
                    B256::from(head),
                    B256::from(random_slot),
                    B256::from(masked_receiver),
                ],
                shieldKey: B256::from(*shield_key.as_bytes()),
            },
        })
    }

    /// Recover the note random as the receiver
    pub fn decrypt_random(
        ciphertext: &abi::ShieldCiphertext,
        receiver_viewing: &ViewingKeyPair,
    ) -> Result<NoteRandom> {
        let shared_key = shared_symmetric_key(receiver_viewing.secret(), &ciphertext.shieldKey.0)?;
        let bundle = &ciphertext.encryptedBundle;

        let mut iv = [0u8; IV_LENGTH];
        let mut tag = [0u8; 16];
        iv.copy_from_slice(&bundle[0][..IV_LENGTH]);
        tag.copy_from_slice(&bundle[0][IV_LENGTH..]);

        let blocks = decrypt_blocks(
            &Ciphertext {
                iv,
                tag,
                data: vec![bundle[1][..NOTE_RANDOM_LENGTH].to_vec()],
            },
            &shared_key,
        )?;
        note_random_from(&blocks[0])
    }

    /// Recover the receiver's viewing key as the shielder
    pub fn decrypt_receiver_viewing_key(
        ciphertext: &abi::ShieldCiphertext,
        shield_private_key: &[u8; 32],
    ) -> [u8; 32] {
        let bundle = &ciphertext.encryptedBundle;
        let mut receiver_iv = [0u8; IV_LENGTH];
        receiver_iv.copy_from_slice(&bundle[1][NOTE_RANDOM_LENGTH..]);
        xor32(&bundle[2].0, &receiver_key_mask(shield_private_key, &receiver_iv))
    }
}

fn receiver_key_mask(shield_private_key: &[u8; 32], receiver_iv: &[u8; IV_LENGTH]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(SHIELD_RECEIVER_MASK_CONTEXT);
    hasher.update(shield_private_key);
    hasher.update(receiver_iv);
    *hasher.finalize().as_bytes()
}

// ============================================================================
// Transact
// ============================================================================

/// Note moving value between pool participants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactNote {
    pub receiver: AddressKeys,
    /// Known only when the sender chose to reveal it
    pub sender_master_public_key: Option<Fr>,
    pub random: NoteRandom,
    pub value: u128,
    pub token: TokenData,
    pub sender_random: SenderRandom,
    pub output_type: Option<OutputType>,
    pub wallet_source: Option<String>,
    pub memo_text: Option<String>,
}

impl TransactNote {
    /// New transfer output with fresh randomness
    pub fn create_transfer(
        receiver: AddressKeys,
        sender: &AddressKeys,
        value: u128,
        token: TokenData,
        show_sender_address_to_recipient: bool,
        output_type: OutputType,
        memo_text: Option<String>,
    ) -> Self {
        Self {
            receiver,
            sender_master_public_key: show_sender_address_to_recipient
                .then_some(sender.master_public_key),
            random: random_note_random(),
            value,
            token,
            sender_random: sender_random_for(show_sender_address_to_recipient),
            output_type: Some(output_type),
            wallet_source: None,
            memo_text,
        }
    }

    /// Transfer output whose sender visibility comes from builder configuration
    pub fn create_configured_transfer(
        receiver: AddressKeys,
        sender: &AddressKeys,
        value: u128,
        token: TokenData,
        output_type: OutputType,
        memo_text: Option<String>,
        config: &BuilderConfig,
    ) -> Self {
        Self::create_transfer(
            receiver,
            sender,
            value,
            token,
            config.show_sender_address_to_recipient,
            output_type,
            memo_text,
        )
    }

    /// Replace the note random; fails unless exactly 16 bytes
    pub fn with_random(mut self, random: &[u8]) -> Result<Self> {
        self.random = note_random_from(random)?;
        Ok(self)
    }

    pub fn with_wallet_source(mut self, wallet_source: impl Into<String>) -> Self {
        self.wallet_source = Some(wallet_source.into());
        self
    }

    pub fn note_public_key(&self) -> Fr {
        note_hash(&[self.receiver.master_public_key, fr_from_bytes(&self.random)])
    }

    pub fn hash(&self) -> Fr {
        derive_commitment_hash(&self.note_public_key(), &self.token.hash(), self.value)
    }

    /// Receiver MPK, XORed with the sender MPK when the sender is revealed
    fn encoded_master_public_key(&self) -> [u8; 32] {
        let receiver = fr_to_bytes(&self.receiver.master_public_key);
        match &self.sender_master_public_key {
            Some(sender) => xor32(&receiver, &fr_to_bytes(sender)),
            None => receiver,
        }
    }

    /// Encrypt to the receiver under a per-note shared key.
    ///
    /// ```text
    /// data[0] = encodedMasterPublicKey
    /// data[1] = tokenHash
    /// data[2] = random (16) || value (16, big-endian)
    /// memo    = memo text, encrypted in the same message
    /// ```
    pub fn encrypt(
        &self,
        sender_viewing: &ViewingKeyPair,
        memo_max_bytes: usize,
    ) -> Result<CommitmentCiphertext> {
        let blinding = note_blinding_keys(
            &sender_viewing.public_bytes(),
            &self.receiver.viewing_public_key,
            &self.random,
            &self.sender_random,
        );
        let shared_key =
            shared_symmetric_key(sender_viewing.secret(), &blinding.blinded_receiver_viewing_key)?;

        let mut random_value = Vec::with_capacity(32);
        random_value.extend_from_slice(&self.random);
        random_value.extend_from_slice(&self.value.to_be_bytes());

        let mut blocks = vec![
            self.encoded_master_public_key().to_vec(),
            fr_to_bytes(&self.token.hash()).to_vec(),
            random_value,
        ];
        let memo = encode_memo_text(self.memo_text.as_deref(), memo_max_bytes);
        if !memo.is_empty() {
            blocks.push(memo);
        }

        let mut ciphertext = encrypt_blocks(&blocks, &shared_key)?;
        let memo = ciphertext
            .data
            .split_off(CIPHERTEXT_DATA_BLOCKS)
            .into_iter()
            .next()
            .unwrap_or_default();

        let annotation_data = create_annotation_data(
            &NoteAnnotationData {
                output_type: self.output_type.unwrap_or(OutputType::Transfer),
                sender_random: self.sender_random,
                wallet_source: self.wallet_source.clone(),
            },
            &sender_viewing.private_bytes(),
        )?;

        Ok(CommitmentCiphertext {
            ciphertext,
            blinded_sender_viewing_key: blinding.blinded_sender_viewing_key,
            blinded_receiver_viewing_key: blinding.blinded_receiver_viewing_key,
            annotation_data,
            memo,
        })
    }

    /// Decrypt a transfer output addressed to `receiver`.
    ///
    /// NFT token hashes cannot be inverted; such notes only decrypt when the
    /// token is listed in `known_tokens`. With `expected_hash` set, the
    /// recovered note must hash to that commitment.
    pub fn decrypt<W: WalletKeyContext>(
        commitment: &CommitmentCiphertext,
        receiver: &W,
        known_tokens: &[TokenData],
        expected_hash: Option<&Fr>,
    ) -> Result<Self> {
        let viewing = receiver.viewing_key_pair();
        let shared_key =
            shared_symmetric_key(viewing.secret(), &commitment.blinded_sender_viewing_key)?;

        let mut ciphertext = commitment.ciphertext.clone();
        if !commitment.memo.is_empty() {
            ciphertext.data.push(commitment.memo.clone());
        }
        let blocks = decrypt_blocks(&ciphertext, &shared_key)?;
        if blocks.len() < CIPHERTEXT_DATA_BLOCKS
            || blocks[..CIPHERTEXT_DATA_BLOCKS].iter().any(|b| b.len() != 32)
        {
            return Err(PrivacyError::CiphertextShape {
                expected: CIPHERTEXT_DATA_BLOCKS,
                got: blocks.len(),
            });
        }

        let own = receiver.address_keys();
        let own_mpk = fr_to_bytes(&own.master_public_key);
        let mut encoded_mpk = [0u8; 32];
        encoded_mpk.copy_from_slice(&blocks[0]);
        let sender_master_public_key =
            (encoded_mpk != own_mpk).then(|| fr_from_bytes(&xor32(&encoded_mpk, &own_mpk)));

        let token_hash = fr_from_bytes(&blocks[1]);
        let token = known_tokens
            .iter()
            .find(|token| token.hash() == token_hash)
            .cloned()
            .or_else(|| TokenData::from_fungible_hash(&token_hash))
            .ok_or(PrivacyError::UnknownToken)?;

        let random = note_random_from(&blocks[2][..NOTE_RANDOM_LENGTH])?;
        let mut value_bytes = [0u8; 16];
        value_bytes.copy_from_slice(&blocks[2][NOTE_RANDOM_LENGTH..]);

        // Only readable when we also sent this note.
        let annotation =
            decrypt_annotation_data(&commitment.annotation_data, &viewing.private_bytes()).ok();

        let note = Self {
            receiver: own,
            sender_master_public_key,
            random,
            value: u128::from_be_bytes(value_bytes),
            token,
            sender_random: annotation
                .as_ref()
                .map(|a| a.sender_random)
                .unwrap_or(MEMO_SENDER_RANDOM_NULL),
            output_type: annotation.as_ref().map(|a| a.output_type),
            wallet_source: annotation.and_then(|a| a.wallet_source),
            memo_text: blocks.get(CIPHERTEXT_DATA_BLOCKS).and_then(|m| decode_memo_text(m)),
        };

        if let Some(expected) = expected_hash {
            if note.hash() != *expected {
                return Err(PrivacyError::CommitmentMismatch);
            }
        }
        Ok(note)
    }
}

/// Sum of note values, failing on overflow
pub fn total_note_values(notes: &[TransactNote]) -> Result<u128> {
    notes.iter().try_fold(0u128, |acc, note| {
        acc.checked_add(note.value).ok_or(PrivacyError::ValueOverflow)
    })
}

// ============================================================================
// Unshield
// ============================================================================

/// Requested pool exit, before it is bound to a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitData {
    pub to_address: Address,
    pub value: u128,
    pub token: TokenData,
    pub allow_override: bool,
}

/// Note created when value leaves the pool to a public address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnshieldNote {
    pub to_address: Address,
    pub value: u128,
    pub token: TokenData,
    pub allow_override: bool,
}

impl UnshieldNote {
    /// ERC721 exits always move exactly one unit
    pub fn new(to_address: Address, value: u128, token: TokenData, allow_override: bool) -> Self {
        let value = match token.token_type {
            TokenType::Erc721 => ERC721_NOTE_VALUE,
            TokenType::Erc20 | TokenType::Erc1155 => value,
        };
        Self {
            to_address,
            value,
            token,
            allow_override,
        }
    }

    /// Exit from a raw ledger token triple
    pub fn from_raw(
        to_address: Address,
        value: u128,
        token_type: u8,
        token_address: Address,
        token_sub_id: U256,
        allow_override: bool,
    ) -> Result<Self> {
        let token = TokenData::new(TokenType::try_from(token_type)?, token_address, token_sub_id)?;
        Ok(Self::new(to_address, value, token, allow_override))
    }

    /// Placeholder preimage of transactions without an exit
    pub fn empty() -> Self {
        Self::new(Address::ZERO, 0, TokenData::erc20(Address::ZERO), false)
    }

    /// Exit notes commit to the address instead of a note public key
    pub fn note_public_key(&self) -> Fr {
        fr_from_bytes(self.to_address.into_word().as_slice())
    }

    pub fn hash(&self) -> Fr {
        derive_commitment_hash(&self.note_public_key(), &self.token.hash(), self.value)
    }

    pub fn preimage(&self) -> Result<abi::CommitmentPreimage> {
        Ok(abi::CommitmentPreimage {
            npk: self.to_address.into_word(),
            token: self.token.to_abi(),
            value: ledger_value(self.value)?,
        })
    }
}

impl From<ExitData> for UnshieldNote {
    fn from(exit: ExitData) -> Self {
        Self::new(exit.to_address, exit.value, exit.token, exit.allow_override)
    }
}

// ============================================================================
// Variants
// ============================================================================

/// Any note variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Shield(ShieldNote),
    Transact(TransactNote),
    Unshield(UnshieldNote),
}

pub fn note_value(note: &Note) -> u128 {
    match note {
        Note::Shield(n) => n.value,
        Note::Transact(n) => n.value,
        Note::Unshield(n) => n.value,
    }
}

pub fn note_token(note: &Note) -> &TokenData {
    match note {
        Note::Shield(n) => &n.token,
        Note::Transact(n) => &n.token,
        Note::Unshield(n) => &n.token,
    }
}

/// Note public key, or the padded address for exit notes
pub fn note_public_key(note: &Note) -> Fr {
    match note {
        Note::Shield(n) => n.note_public_key(),
        Note::Transact(n) => n.note_public_key(),
        Note::Unshield(n) => n.note_public_key(),
    }
}

pub fn commitment_hash(note: &Note) -> Fr {
    derive_commitment_hash(&note_public_key(note), &note_token(note).hash(), note_value(note))
}
