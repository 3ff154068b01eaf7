//! Wallet Keys, Key Blinding and Shared Secrets
//!
//! ```text
//! spending key   sk  (Jubjub scalar)   -> spendingPub = sk * G
//! viewing key    vk  (X25519)          -> viewingPub
//! nullifyingKey       = NoteHash(vk)
//! masterPublicKey     = NoteHash(spendingPub.x, spendingPub.y, nullifyingKey)
//! ```
//!
//! Each transfer output blinds both viewing public keys with a per-note
//! scalar so repeated transfers between the same pair of wallets cannot be
//! linked by key reuse:
//!
//! ```text
//! b                  = KDF(random || senderRandom)
//! blindedSender      = X25519(b, senderViewingPub)
//! blindedReceiver    = X25519(b, receiverViewingPub)
//! sharedKey          = KDF(X25519(senderViewingPriv, blindedReceiver))
//!                    = KDF(X25519(receiverViewingPriv, blindedSender))
//! ```

use ark_bls12_381::Fr;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bls12_381::{EdwardsAffine, Fr as JubjubScalar};
use ark_ff::PrimeField;
use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{PrivacyError, Result};
use crate::hash::{fr_from_bytes, note_hash};
use crate::memo::SenderRandom;

const BLINDING_CONTEXT: &str = "shadepool 2024 note blinding scalar v1";
const SHARED_KEY_CONTEXT: &str = "shadepool 2024 note shared symmetric key v1";

/// Public half of the spending key pair, as circuit field elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendingPublicKey {
    pub x: Fr,
    pub y: Fr,
}

/// X25519 viewing key pair
#[derive(Clone)]
pub struct ViewingKeyPair {
    private_key: StaticSecret,
    public_key: PublicKey,
}

impl ViewingKeyPair {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(StaticSecret::random_from_rng(rng))
    }

    pub fn from_bytes(private_key: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(private_key))
    }

    fn from_secret(private_key: StaticSecret) -> Self {
        let public_key = PublicKey::from(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public_key.as_bytes()
    }

    pub fn private_bytes(&self) -> [u8; 32] {
        self.private_key.to_bytes()
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.private_key
    }
}

impl std::fmt::Debug for ViewingKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewingKeyPair")
            .field("public_key", self.public_key.as_bytes())
            .finish_non_exhaustive()
    }
}

/// Everything a counterparty needs to pay a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressKeys {
    pub master_public_key: Fr,
    pub viewing_public_key: [u8; 32],
}

/// Credential material of the spending wallet.
///
/// Key storage lives outside this crate; the builder only reads through this
/// trait.
pub trait WalletKeyContext {
    fn spending_public_key(&self) -> SpendingPublicKey;

    fn nullifying_key(&self) -> Fr;

    fn viewing_key_pair(&self) -> &ViewingKeyPair;

    fn address_keys(&self) -> AddressKeys {
        AddressKeys {
            master_public_key: master_public_key(
                &self.spending_public_key(),
                &self.nullifying_key(),
            ),
            viewing_public_key: self.viewing_key_pair().public_bytes(),
        }
    }
}

/// In-memory wallet key bundle
#[derive(Debug, Clone)]
pub struct WalletKeys {
    spending_key: [u8; 32],
    viewing: ViewingKeyPair,
}

impl WalletKeys {
    /// Generate a new random key bundle
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut spending_key = [0u8; 32];
        rng.fill_bytes(&mut spending_key);
        Self {
            spending_key,
            viewing: ViewingKeyPair::random(rng),
        }
    }

    /// Restore from raw spending and viewing private keys
    pub fn from_bytes(spending_key: [u8; 32], viewing_key: [u8; 32]) -> Self {
        Self {
            spending_key,
            viewing: ViewingKeyPair::from_bytes(viewing_key),
        }
    }
}

impl WalletKeyContext for WalletKeys {
    fn spending_public_key(&self) -> SpendingPublicKey {
        let sk = JubjubScalar::from_le_bytes_mod_order(&self.spending_key);
        let point = (EdwardsAffine::generator() * sk).into_affine();
        SpendingPublicKey {
            x: point.x,
            y: point.y,
        }
    }

    fn nullifying_key(&self) -> Fr {
        nullifying_key(&self.viewing.private_bytes())
    }

    fn viewing_key_pair(&self) -> &ViewingKeyPair {
        &self.viewing
    }
}

/// nullifyingKey = NoteHash(viewingPrivateKey)
pub fn nullifying_key(viewing_private_key: &[u8; 32]) -> Fr {
    note_hash(&[fr_from_bytes(viewing_private_key)])
}

/// masterPublicKey = NoteHash(spendingPub.x, spendingPub.y, nullifyingKey)
pub fn master_public_key(spending_public_key: &SpendingPublicKey, nullifying_key: &Fr) -> Fr {
    note_hash(&[spending_public_key.x, spending_public_key.y, *nullifying_key])
}

/// Blinded viewing keys carried next to a transfer ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteBlindingKeys {
    pub blinded_sender_viewing_key: [u8; 32],
    pub blinded_receiver_viewing_key: [u8; 32],
}

/// Blind both viewing public keys with the note's randomness
pub fn note_blinding_keys(
    sender_viewing_public_key: &[u8; 32],
    receiver_viewing_public_key: &[u8; 32],
    random: &[u8; 16],
    sender_random: &SenderRandom,
) -> NoteBlindingKeys {
    let mut hasher = blake3::Hasher::new_derive_key(BLINDING_CONTEXT);
    hasher.update(random);
    hasher.update(sender_random);
    let blinding_scalar = *hasher.finalize().as_bytes();

    NoteBlindingKeys {
        blinded_sender_viewing_key: x25519_dalek::x25519(
            blinding_scalar,
            *sender_viewing_public_key,
        ),
        blinded_receiver_viewing_key: x25519_dalek::x25519(
            blinding_scalar,
            *receiver_viewing_public_key,
        ),
    }
}

/// ECDH between our viewing private key and a counterparty's (blinded) key
pub fn shared_symmetric_key(private_key: &StaticSecret, blinded_public_key: &[u8; 32]) -> Result<[u8; 32]> {
    let shared = private_key.diffie_hellman(&PublicKey::from(*blinded_public_key));
    if !shared.was_contributory() {
        return Err(PrivacyError::KeyAgreementFailure);
    }
    let mut hasher = blake3::Hasher::new_derive_key(SHARED_KEY_CONTEXT);
    hasher.update(shared.as_bytes());
    Ok(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::MEMO_SENDER_RANDOM_NULL;

    #[test]
    fn test_key_derivation_is_stable() {
        let keys = WalletKeys::from_bytes([3u8; 32], [4u8; 32]);
        let again = WalletKeys::from_bytes([3u8; 32], [4u8; 32]);

        assert_eq!(keys.address_keys(), again.address_keys());
        assert_eq!(keys.nullifying_key(), again.nullifying_key());
        assert_eq!(keys.spending_public_key(), again.spending_public_key());
    }

    #[test]
    fn test_shared_key_agrees_on_both_sides() {
        let mut rng = rand::thread_rng();
        let sender = ViewingKeyPair::random(&mut rng);
        let receiver = ViewingKeyPair::random(&mut rng);

        let blinded = note_blinding_keys(
            &sender.public_bytes(),
            &receiver.public_bytes(),
            &[7u8; 16],
            &[9u8; 15],
        );

        let sender_side =
            shared_symmetric_key(sender.secret(), &blinded.blinded_receiver_viewing_key).unwrap();
        let receiver_side =
            shared_symmetric_key(receiver.secret(), &blinded.blinded_sender_viewing_key).unwrap();

        assert_eq!(sender_side, receiver_side);
    }

    #[test]
    fn test_blinding_unlinks_repeated_transfers() {
        let mut rng = rand::thread_rng();
        let sender = ViewingKeyPair::random(&mut rng);
        let receiver = ViewingKeyPair::random(&mut rng);

        let first = note_blinding_keys(
            &sender.public_bytes(),
            &receiver.public_bytes(),
            &[1u8; 16],
            &MEMO_SENDER_RANDOM_NULL,
        );
        let second = note_blinding_keys(
            &sender.public_bytes(),
            &receiver.public_bytes(),
            &[2u8; 16],
            &MEMO_SENDER_RANDOM_NULL,
        );

        assert_ne!(first, second);
        assert_ne!(first.blinded_receiver_viewing_key, receiver.public_bytes());
    }

    #[test]
    fn test_identity_point_rejected() {
        let mut rng = rand::thread_rng();
        let sender = ViewingKeyPair::random(&mut rng);

        let result = shared_symmetric_key(sender.secret(), &[0u8; 32]);
        assert_eq!(result.unwrap_err(), PrivacyError::KeyAgreementFailure);
    }
}
