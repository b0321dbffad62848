//! Envelope encryption — AES-256-GCM with a per-record scrypt-derived key.
//!
//! This module provides:
//! - [`seal`] — encrypt plaintext under a fresh salt + IV, returning [`EncryptedRecord`]
//! - [`open`] — authenticate and decrypt an [`EncryptedRecord`]
//! - [`EncryptedRecord`] — version + salt + iv + ciphertext + tag container
//!
//! Each call to [`seal`] generates a new random 64-byte salt and 16-byte IV,
//! then derives a one-off 256-bit key from the long-lived master key and the
//! fresh salt. No key or IV is ever reused across records, even though a
//! single master key stays in memory for the whole session.

use aes::Aes256;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::AeadInPlace;
use aes_gcm::{AesGcm, KeyInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::kdf::{self, ScryptParams};
use crate::memory::SecretBuffer;

/// Current record format version.
pub const FORMAT_VERSION: u32 = 1;

/// Per-record salt length in bytes. Generous by design — the salt is cheap
/// and never reused.
pub const SALT_LEN: usize = 64;

/// AES-256-GCM IV length in bytes (128 bits).
pub const IV_LEN: usize = 16;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Wire-format header: version (4) + salt + iv.
const HEADER_LEN: usize = 4 + SALT_LEN + IV_LEN;

/// Minimum valid serialized length: header + empty ciphertext + tag.
const MIN_RECORD_LEN: usize = HEADER_LEN + TAG_LEN;

/// AES-256-GCM parameterized with a 128-bit nonce.
///
/// The record format fixes the IV at 16 bytes, so the generic `AesGcm`
/// construction is used instead of the 96-bit-nonce `Aes256Gcm` alias.
type EnvelopeCipher = AesGcm<Aes256, U16>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Authenticated ciphertext container with its key-derivation salt.
///
/// Wire format: `version (4 bytes LE) || salt (64) || iv (16) || ciphertext || tag (16)`.
///
/// The salt and IV are randomly generated per [`seal`] call and must travel
/// with the ciphertext. The tag provides authentication — any modification
/// to the salt, IV, ciphertext, or tag makes [`open`] fail.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Record format version. Unknown versions are rejected on decrypt.
    pub version: u32,
    /// 64-byte random KDF salt, unique per record.
    pub salt: Vec<u8>,
    /// 128-bit random IV, unique per record.
    pub iv: [u8; IV_LEN],
    /// Encrypted data (same length as original plaintext).
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl EncryptedRecord {
    /// Serialize to wire format: `version || salt || iv || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = HEADER_LEN
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Deserialize from wire format.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the input is shorter than the
    /// minimum record length (100 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_RECORD_LEN {
            return Err(CryptoError::Encryption(format!(
                "record too short: {} bytes (minimum {MIN_RECORD_LEN})",
                bytes.len()
            )));
        }

        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(&bytes[..4]);
        let version = u32::from_le_bytes(version_bytes);

        let salt = bytes[4..4usize.saturating_add(SALT_LEN)].to_vec();

        let iv_start = 4usize.saturating_add(SALT_LEN);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&bytes[iv_start..HEADER_LEN]);

        // The length guard above guarantees bytes.len() >= HEADER_LEN + TAG_LEN,
        // so this subtraction cannot underflow.
        let ct_end = bytes
            .len()
            .checked_sub(TAG_LEN)
            .ok_or_else(|| CryptoError::Encryption("record length underflow".into()))?;
        let ciphertext = bytes[HEADER_LEN..ct_end].to_vec();

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[ct_end..]);

        Ok(Self {
            version,
            salt,
            iv,
            ciphertext,
            tag,
        })
    }
}

// ---------------------------------------------------------------------------
// Core encryption
// ---------------------------------------------------------------------------

/// Encrypt plaintext under the master key with a fresh salt and IV.
///
/// Derives a one-off 256-bit key via scrypt from `master_key` and a random
/// 64-byte salt, then runs AES-256-GCM with a random 128-bit IV and a
/// detached 16-byte tag.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the scrypt parameters are
/// invalid, `CryptoError::SecureMemory` if the CSPRNG fails, or
/// `CryptoError::Encryption` if the AEAD operation fails.
pub fn seal(
    plaintext: &[u8],
    master_key: &[u8],
    params: &ScryptParams,
) -> Result<EncryptedRecord, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;

    let mut iv = [0u8; IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;

    let record_key = kdf::derive(master_key, &salt, params)?;
    let cipher = EnvelopeCipher::new(GenericArray::from_slice(record_key.expose()));

    // Encrypt in place — plaintext buffer becomes ciphertext.
    let mut in_out = plaintext.to_vec();
    let Ok(tag) =
        cipher.encrypt_in_place_detached(GenericArray::from_slice(&iv), &[], &mut in_out)
    else {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(EncryptedRecord {
        version: FORMAT_VERSION,
        salt: salt.to_vec(),
        iv,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Authenticate and decrypt an [`EncryptedRecord`].
///
/// Unknown versions are rejected before any key derivation. The key is
/// re-derived from `master_key` and the stored salt; any tag mismatch
/// yields [`CryptoError::Decryption`] — never partial or best-effort
/// plaintext.
///
/// # Errors
///
/// - [`CryptoError::UnsupportedVersion`] for a version this build does not know
/// - [`CryptoError::KeyDerivation`] if the stored salt is malformed
/// - [`CryptoError::Decryption`] on tag mismatch (tampering or wrong key)
pub fn open(
    record: &EncryptedRecord,
    master_key: &[u8],
    params: &ScryptParams,
) -> Result<SecretBuffer, CryptoError> {
    if record.version != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion {
            found: record.version,
        });
    }

    let record_key = kdf::derive(master_key, &record.salt, params)?;
    let cipher = EnvelopeCipher::new(GenericArray::from_slice(record_key.expose()));

    let mut in_out = record.ciphertext.clone();
    let verified = cipher.decrypt_in_place_detached(
        GenericArray::from_slice(&record.iv),
        &[],
        &mut in_out,
        GenericArray::from_slice(&record.tag),
    );
    if verified.is_err() {
        in_out.zeroize();
        return Err(CryptoError::Decryption);
    }

    let result = SecretBuffer::new(&in_out);
    in_out.zeroize();
    Ok(result)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
