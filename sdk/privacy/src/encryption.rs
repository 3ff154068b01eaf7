//! Note Payload Encryption
//!
//! AES-256-GCM with a 16-byte IV over an ordered list of blocks. The blocks
//! are encrypted as one message and split back at their original lengths, so
//! a ciphertext keeps the block layout of its plaintext.
//!
//! ```text
//! Ciphertext = { iv (16), tag (16), data: [block0, block1, ..] }
//! ```

use aes_gcm::{
    AesGcm,
    aead::{AeadInPlace, KeyInit, consts::U16, generic_array::GenericArray},
    aes::Aes256,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{PrivacyError, Result};

/// IV length in bytes
pub const IV_LENGTH: usize = 16;
/// Authentication tag length in bytes
pub const TAG_LENGTH: usize = 16;

type NoteCipher = AesGcm<Aes256, U16>;

/// Encrypted blocks plus their IV and tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub iv: [u8; IV_LENGTH],
    pub tag: [u8; TAG_LENGTH],
    pub data: Vec<Vec<u8>>,
}

/// Encrypt `blocks` under `key` with a fresh random IV
pub fn encrypt_blocks(blocks: &[Vec<u8>], key: &[u8; 32]) -> Result<Ciphertext> {
    let mut iv = [0u8; IV_LENGTH];
    rand::thread_rng().fill_bytes(&mut iv);
    encrypt_blocks_with_iv(blocks, key, iv)
}

/// Encrypt `blocks` under `key` and a caller-chosen IV
pub fn encrypt_blocks_with_iv(
    blocks: &[Vec<u8>],
    key: &[u8; 32],
    iv: [u8; IV_LENGTH],
) -> Result<Ciphertext> {
    let cipher = NoteCipher::new_from_slice(key).map_err(|_| PrivacyError::EncryptionFailed)?;

    let mut buffer = blocks.concat();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), &[], &mut buffer)
        .map_err(|_| PrivacyError::EncryptionFailed)?;

    let mut out_tag = [0u8; TAG_LENGTH];
    out_tag.copy_from_slice(tag.as_slice());

    Ok(Ciphertext {
        iv,
        tag: out_tag,
        data: split_like(&buffer, blocks.iter().map(Vec::len)),
    })
}

/// Decrypt and authenticate; any tampering yields `DecryptionFailed`
pub fn decrypt_blocks(ciphertext: &Ciphertext, key: &[u8; 32]) -> Result<Vec<Vec<u8>>> {
    let cipher = NoteCipher::new_from_slice(key).map_err(|_| PrivacyError::DecryptionFailed)?;

    let mut buffer = ciphertext.data.concat();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(&ciphertext.iv),
            &[],
            &mut buffer,
            GenericArray::from_slice(&ciphertext.tag),
        )
        .map_err(|_| PrivacyError::DecryptionFailed)?;

    Ok(split_like(&buffer, ciphertext.data.iter().map(Vec::len)))
}

fn split_like(buffer: &[u8], lengths: impl Iterator<Item = usize>) -> Vec<Vec<u8>> {
    let mut offset = 0;
    lengths
        .map(|len| {
            let block = buffer[offset..offset + len].to_vec();
            offset += len;
            block
        })
        .collect()
}
