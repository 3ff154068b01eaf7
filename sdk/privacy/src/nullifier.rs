//! Nullifiers
//!
//! ```text
//! Nullifier = NoteHash(nullifyingKey, leafPosition)
//! ```
//!
//! Once a nullifier is published, the corresponding note cannot be spent
//! again. Without the nullifying key a nullifier cannot be linked back to
//! its commitment.

use ark_bls12_381::Fr;

use crate::hash::note_hash;

/// Derive the nullifier of the note at `position` in its tree
pub fn derive_nullifier(nullifying_key: &Fr, position: u64) -> Fr {
    note_hash(&[*nullifying_key, Fr::from(position)])
}
