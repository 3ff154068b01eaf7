//! Commitment Ciphertext Wire Codec
//!
//! The ledger stores a transfer ciphertext in four 32-byte slots:
//!
//! ```text
//! slot 0 = iv (16) || tag (16)
//! slot 1 = data[0]
//! slot 2 = data[1]
//! slot 3 = data[2]
//! ```
//!
//! Blinded viewing keys, annotation data and memo travel next to the slots
//! as opaque byte fields.

use alloy_primitives::{B256, Bytes};

use crate::abi;
use crate::encryption::{Ciphertext, IV_LENGTH, TAG_LENGTH};
use crate::error::{PrivacyError, Result};

/// Number of 32-byte slots in a packed ciphertext
pub const CIPHERTEXT_SLOTS: usize = 4;

/// Number of encrypted data blocks carried in the slots
pub const CIPHERTEXT_DATA_BLOCKS: usize = CIPHERTEXT_SLOTS - 1;

/// In-memory form of a transfer output's ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentCiphertext {
    pub ciphertext: Ciphertext,
    pub blinded_sender_viewing_key: [u8; 32],
    pub blinded_receiver_viewing_key: [u8; 32],
    pub annotation_data: Vec<u8>,
    pub memo: Vec<u8>,
}

/// Pack a ciphertext of exactly three 32-byte blocks into ledger slots
pub fn pack_ciphertext(ciphertext: &Ciphertext) -> Result<[B256; CIPHERTEXT_SLOTS]> {
    if ciphertext.data.len() != CIPHERTEXT_DATA_BLOCKS {
        return Err(PrivacyError::CiphertextShape {
            expected: CIPHERTEXT_DATA_BLOCKS,
            got: ciphertext.data.len(),
        });
    }
    if ciphertext.data.iter().any(|block| block.len() != 32) {
        return Err(PrivacyError::CiphertextShape {
            expected: CIPHERTEXT_DATA_BLOCKS,
            got: ciphertext.data.len(),
        });
    }

    let mut head = [0u8; 32];
    head[..IV_LENGTH].copy_from_slice(&ciphertext.iv);
    head[IV_LENGTH..].copy_from_slice(&ciphertext.tag);

    Ok([
        B256::from(head),
        B256::from_slice(&ciphertext.data[0]),
        B256::from_slice(&ciphertext.data[1]),
        B256::from_slice(&ciphertext.data[2]),
    ])
}

/// Split ledger slots back into IV, tag and data blocks
pub fn unpack_ciphertext(slots: &[B256; CIPHERTEXT_SLOTS]) -> Ciphertext {
    let mut iv = [0u8; IV_LENGTH];
    let mut tag = [0u8; TAG_LENGTH];
    iv.copy_from_slice(&slots[0][..IV_LENGTH]);
    tag.copy_from_slice(&slots[0][IV_LENGTH..]);

    Ciphertext {
        iv,
        tag,
        data: slots[1..].iter().map(|slot| slot.to_vec()).collect(),
    }
}

pub fn encode_commitment_ciphertext(
    commitment: &CommitmentCiphertext,
) -> Result<abi::CommitmentCiphertext> {
    Ok(abi::CommitmentCiphertext {
        ciphertext: pack_ciphertext(&commitment.ciphertext)?,
        blindedSenderViewingKey: B256::from(commitment.blinded_sender_viewing_key),
        blindedReceiverViewingKey: B256::from(commitment.blinded_receiver_viewing_key),
        annotationData: Bytes::copy_from_slice(&commitment.annotation_data),
        memo: Bytes::copy_from_slice(&commitment.memo),
    })
}

pub fn decode_commitment_ciphertext(raw: &abi::CommitmentCiphertext) -> CommitmentCiphertext {
    CommitmentCiphertext {
        ciphertext: unpack_ciphertext(&raw.ciphertext),
        blinded_sender_viewing_key: raw.blindedSenderViewingKey.0,
        blinded_receiver_viewing_key: raw.blindedReceiverViewingKey.0,
        annotation_data: raw.annotationData.to_vec(),
        memo: raw.memo.to_vec(),
    }
}

/// One output of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentSummary {
    pub commitment_ciphertext: CommitmentCiphertext,
    pub commitment_hash: B256,
}

/// Ciphertext and commitment of output `index` of an on-chain transaction.
///
/// Outputs past the ciphertext list (the exit preimage) have no summary.
pub fn commitment_summary(
    transaction: &abi::Transaction,
    index: usize,
) -> Option<CommitmentSummary> {
    let ciphertext = transaction.boundParams.commitmentCiphertext.get(index)?;
    let commitment_hash = *transaction.commitments.get(index)?;
    Some(CommitmentSummary {
        commitment_ciphertext: decode_commitment_ciphertext(ciphertext),
        commitment_hash,
    })
}
