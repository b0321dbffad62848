//! Cryptographic error types for `herse-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (scrypt parameter validation, salt length).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure (AES-256-GCM).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed — ciphertext tampered or wrong key.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// Record carries a format version this build does not understand.
    ///
    /// Rejected outright before any key derivation — a forward-compat guard,
    /// never silently ignored.
    #[error("unsupported record version: {found}")]
    UnsupportedVersion {
        /// The version field found in the record.
        found: u32,
    },

    /// Secure memory allocation or CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// Password policy misconfiguration (e.g. zero minimum length).
    #[error("policy configuration error: {0}")]
    PolicyConfig(String),
}
