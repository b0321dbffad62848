//! `herse-crypto-core` — Pure cryptographic primitives for HERSE.
//!
//! This crate is the audit target: zero network, zero async, zero host
//! dependencies. Envelope encryption, scrypt key derivation, secret-memory
//! wrappers, and the password policy evaluator live here; everything
//! stateful (sessions, storage, rate limiting) lives in `herse-session`.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;

pub mod envelope;

pub mod policy;

pub use envelope::{open, seal, EncryptedRecord, FORMAT_VERSION, IV_LEN, SALT_LEN, TAG_LEN};
pub use error::CryptoError;
pub use kdf::{derive, KdfPreset, ScryptParams};
pub use memory::{SecretBuffer, SecretBytes};
pub use policy::{PasswordPolicy, PolicyReport, PolicyViolation};
