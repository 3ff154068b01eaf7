//! Note Annotation and Memo
//!
//! Every transfer output carries an annotation blob that only the sender can
//! open. It records why the output exists and the sender random used when
//! blinding viewing keys, so the sender can rebuild their own history from
//! chain data alone.
//!
//! ```text
//! annotationData = nonce (12) || ChaCha20-Poly1305(
//!     key = KDF(senderViewingPriv),
//!     outputType (1) || senderRandom (15) || walletSource (..)
//! )
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{PrivacyError, Result};

const ANNOTATION_KEY_CONTEXT: &str = "shadepool 2024 annotation data key v1";
const NONCE_LEN: usize = 12;

/// Length of the sender random carried in annotation data
pub const SENDER_RANDOM_LENGTH: usize = 15;

/// Sender-chosen entropy mixed into viewing key blinding
pub type SenderRandom = [u8; SENDER_RANDOM_LENGTH];

/// Sender random of a note whose sender address is revealed to the receiver
pub const MEMO_SENDER_RANDOM_NULL: SenderRandom = [0u8; SENDER_RANDOM_LENGTH];

/// Why an output note was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutputType {
    Transfer = 0,
    BroadcasterFee = 1,
    Change = 2,
}

impl TryFrom<u8> for OutputType {
    type Error = PrivacyError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Transfer),
            1 => Ok(Self::BroadcasterFee),
            2 => Ok(Self::Change),
            _ => Err(PrivacyError::DecryptionFailed),
        }
    }
}

/// Sender-side metadata of an output note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteAnnotationData {
    pub output_type: OutputType,
    pub sender_random: SenderRandom,
    pub wallet_source: Option<String>,
}

/// Encrypt annotation data to the sender's own viewing key
pub fn create_annotation_data(
    annotation: &NoteAnnotationData,
    sender_viewing_private_key: &[u8; 32],
) -> Result<Vec<u8>> {
    let mut plaintext = Vec::with_capacity(1 + SENDER_RANDOM_LENGTH);
    plaintext.push(annotation.output_type as u8);
    plaintext.extend_from_slice(&annotation.sender_random);
    if let Some(source) = &annotation.wallet_source {
        plaintext.extend_from_slice(source.as_bytes());
    }

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(&annotation_key(sender_viewing_private_key))
        .map_err(|_| PrivacyError::EncryptionFailed)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
        .map_err(|_| PrivacyError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open annotation data with the sender's viewing private key
pub fn decrypt_annotation_data(
    annotation_data: &[u8],
    sender_viewing_private_key: &[u8; 32],
) -> Result<NoteAnnotationData> {
    if annotation_data.len() < NONCE_LEN {
        return Err(PrivacyError::DecryptionFailed);
    }
    let (nonce, ciphertext) = annotation_data.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new_from_slice(&annotation_key(sender_viewing_private_key))
        .map_err(|_| PrivacyError::DecryptionFailed)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| PrivacyError::DecryptionFailed)?;

    if plaintext.len() < 1 + SENDER_RANDOM_LENGTH {
        return Err(PrivacyError::DecryptionFailed);
    }
    let output_type = OutputType::try_from(plaintext[0])?;
    let mut sender_random = MEMO_SENDER_RANDOM_NULL;
    sender_random.copy_from_slice(&plaintext[1..1 + SENDER_RANDOM_LENGTH]);

    let source = &plaintext[1 + SENDER_RANDOM_LENGTH..];
    let wallet_source = if source.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(source).into_owned())
    };

    Ok(NoteAnnotationData {
        output_type,
        sender_random,
        wallet_source,
    })
}

/// Sender random recorded in annotation data.
///
/// Blobs that are empty or were not made by this sender yield
/// [`MEMO_SENDER_RANDOM_NULL`].
pub fn decrypt_sender_random(
    annotation_data: &[u8],
    sender_viewing_private_key: &[u8; 32],
) -> SenderRandom {
    decrypt_annotation_data(annotation_data, sender_viewing_private_key)
        .map(|annotation| annotation.sender_random)
        .unwrap_or(MEMO_SENDER_RANDOM_NULL)
}

/// Fresh sender random, or the null value when the sender is revealed
pub fn sender_random_for(show_sender_address_to_recipient: bool) -> SenderRandom {
    if show_sender_address_to_recipient {
        return MEMO_SENDER_RANDOM_NULL;
    }
    let mut sender_random = MEMO_SENDER_RANDOM_NULL;
    rand::thread_rng().fill_bytes(&mut sender_random);
    sender_random
}

/// Memo text as carried inside the encrypted payload, truncated to `max_bytes`
/// on a character boundary
pub fn encode_memo_text(memo_text: Option<&str>, max_bytes: usize) -> Vec<u8> {
    let Some(text) = memo_text else {
        return Vec::new();
    };
    let mut end = text.len().min(max_bytes);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.as_bytes()[..end].to_vec()
}

pub fn decode_memo_text(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn annotation_key(sender_viewing_private_key: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(ANNOTATION_KEY_CONTEXT);
    hasher.update(sender_viewing_private_key);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_roundtrip() {
        let key = [5u8; 32];
        let annotation = NoteAnnotationData {
            output_type: OutputType::Change,
            sender_random: [8u8; 15],
            wallet_source: Some("shadepool".to_string()),
        };

        let blob = create_annotation_data(&annotation, &key).unwrap();
        assert_eq!(decrypt_annotation_data(&blob, &key).unwrap(), annotation);
        assert_eq!(decrypt_sender_random(&blob, &key), [8u8; 15]);
    }

    #[test]
    fn test_foreign_annotation_yields_null_sender_random() {
        let annotation = NoteAnnotationData {
            output_type: OutputType::Transfer,
            sender_random: [8u8; 15],
            wallet_source: None,
        };
        let blob = create_annotation_data(&annotation, &[5u8; 32]).unwrap();

        assert_eq!(
            decrypt_sender_random(&blob, &[6u8; 32]),
            MEMO_SENDER_RANDOM_NULL
        );
        assert_eq!(decrypt_sender_random(&[], &[5u8; 32]), MEMO_SENDER_RANDOM_NULL);
    }

    #[test]
    fn test_revealed_sender_uses_null_random() {
        assert_eq!(sender_random_for(true), MEMO_SENDER_RANDOM_NULL);
    }

    #[test]
    fn test_memo_text_truncates_on_char_boundary() {
        let encoded = encode_memo_text(Some("héllo"), 2);
        assert_eq!(encoded, b"h".to_vec());
        assert_eq!(decode_memo_text(&encode_memo_text(Some("gm"), 256)).as_deref(), Some("gm"));
        assert!(decode_memo_text(&encode_memo_text(None, 256)).is_none());
    }
}
