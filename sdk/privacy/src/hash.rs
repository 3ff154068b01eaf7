//! Note Hash Function
//!
//! Poseidon over the BLS12-381 scalar field, used for every note-level
//! derivation (note public keys, commitments, nullifiers, master keys).
//!
//! ```text
//! NoteHash(x0, x1, ..) = Poseidon(x0 || x1 || ..)
//! ```
//!
//! Ledger byte form of a field element is 32 bytes, big-endian.

use ark_bls12_381::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ff::{BigInteger, PrimeField};
use std::sync::OnceLock;

static POSEIDON_CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Hash an ordered list of field elements
pub fn note_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(poseidon_config());
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_field_elements(1)[0]
}

/// Field element to 32 big-endian bytes
pub fn fr_to_bytes(f: &Fr) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_be();
    let mut arr = [0u8; 32];
    arr[32 - bytes.len()..].copy_from_slice(&bytes);
    arr
}

/// Big-endian bytes to field element, reduced modulo the field order
pub fn fr_from_bytes(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Poseidon configuration
///
/// Field: BLS12-381 Fr (255 bits)
/// Rate: 2, Capacity: 1
/// Security: 128 bits
fn poseidon_config() -> &'static PoseidonConfig<Fr> {
    POSEIDON_CONFIG.get_or_init(|| {
        let prime_bits: u64 = 255;
        let rate: usize = 2;
        let capacity: usize = 1;
        let full_rounds: u64 = 8;
        let partial_rounds: u64 = 57;
        let alpha: u64 = 5;
        let skip_matrices: u64 = 0;

        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            prime_bits,
            rate,
            full_rounds,
            partial_rounds,
            skip_matrices,
        );

        PoseidonConfig::new(
            full_rounds as usize,
            partial_rounds as usize,
            alpha,
            mds,
            ark,
            rate,
            capacity,
        )
    })
}
