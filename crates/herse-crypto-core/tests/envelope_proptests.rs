#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for envelope encryption.

use herse_crypto_core::envelope::{open, seal, EncryptedRecord};
use herse_crypto_core::kdf::ScryptParams;
use herse_crypto_core::CryptoError;
use proptest::prelude::*;

/// Small scrypt params so each case stays fast.
const PROP_PARAMS: ScryptParams = ScryptParams {
    log_n: 5,
    r: 8,
    p: 1,
};

const PROP_KEY: &[u8] = b"property test master key";

proptest! {
    /// seal→open roundtrip always recovers the original plaintext.
    #[test]
    fn seal_open_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let record = seal(&plaintext, PROP_KEY, &PROP_PARAMS)
            .expect("seal should succeed");
        let decrypted = open(&record, PROP_KEY, &PROP_PARAMS)
            .expect("open should succeed");
        prop_assert_eq!(decrypted.expose(), plaintext.as_slice());
    }

    /// Flipping any single bit of the ciphertext makes open fail.
    #[test]
    fn single_bit_flip_in_ciphertext_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 1..512),
        byte_index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut record = seal(&plaintext, PROP_KEY, &PROP_PARAMS)
            .expect("seal should succeed");
        let idx = byte_index.index(record.ciphertext.len());
        record.ciphertext[idx] ^= 1 << bit;
        let result = open(&record, PROP_KEY, &PROP_PARAMS);
        prop_assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    /// Flipping any single bit of the auth tag makes open fail.
    #[test]
    fn single_bit_flip_in_tag_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        tag_index in 0usize..16,
        bit in 0u8..8,
    ) {
        let mut record = seal(&plaintext, PROP_KEY, &PROP_PARAMS)
            .expect("seal should succeed");
        record.tag[tag_index] ^= 1 << bit;
        let result = open(&record, PROP_KEY, &PROP_PARAMS);
        prop_assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    /// Sealing the same plaintext twice never reuses salt, IV, or ciphertext.
    #[test]
    fn no_salt_or_iv_reuse(
        plaintext in proptest::collection::vec(any::<u8>(), 1..256),
    ) {
        let a = seal(&plaintext, PROP_KEY, &PROP_PARAMS).expect("seal");
        let b = seal(&plaintext, PROP_KEY, &PROP_PARAMS).expect("seal");
        prop_assert_ne!(&a.salt, &b.salt);
        prop_assert_ne!(&a.iv, &b.iv);
        prop_assert_ne!(&a.ciphertext, &b.ciphertext);
    }

    /// Wire-format roundtrip preserves every field.
    #[test]
    fn wire_format_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let record = seal(&plaintext, PROP_KEY, &PROP_PARAMS).expect("seal");
        let restored = EncryptedRecord::from_bytes(&record.to_bytes())
            .expect("from_bytes should succeed");
        let decrypted = open(&restored, PROP_KEY, &PROP_PARAMS)
            .expect("open should succeed");
        prop_assert_eq!(decrypted.expose(), plaintext.as_slice());
    }
}
