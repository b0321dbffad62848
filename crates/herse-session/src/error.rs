//! Session error types for `herse-session`.
//!
//! Five recoverable failure kinds (token liveness, integrity, lockout,
//! capability absence, ceremony rejection) plus the single fatal one:
//! a provably invalid security profile at startup.

use herse_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by session and trust operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Bearer token could not be decoded (wrong shape, bad base64, bad JSON).
    #[error("malformed bearer token: {0}")]
    TokenMalformed(String),

    /// Bearer token carries an `exp` claim in the past.
    #[error("bearer token expired")]
    TokenExpired,

    /// Too many failed authentication attempts — lockout active.
    ///
    /// Carries the exact unlock time so the UI can show a countdown.
    #[error("rate limited until {locked_until_ms}")]
    RateLimited {
        /// Absolute unlock time in UNIX-epoch milliseconds.
        locked_until_ms: u64,
    },

    /// Presented CSRF token does not match the current session token.
    #[error("CSRF token mismatch")]
    CsrfMismatch,

    /// The host exposes no platform authenticator capability.
    ///
    /// Distinct from a ceremony failure — callers branch on this before
    /// offering second-factor UI at all.
    #[error("platform authenticator not available")]
    AuthenticatorUnavailable,

    /// The host rejected a credential ceremony (user cancel, policy denial).
    #[error("credential ceremony rejected: {0}")]
    CeremonyRejected(String),

    /// A credential ceremony exceeded its timeout without host confirmation.
    #[error("credential ceremony timed out")]
    CeremonyTimeout,

    /// Durable storage read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid security profile — fatal at startup, never run with unsafe
    /// defaults.
    #[error("invalid security profile: {0}")]
    InvalidProfile(String),
}
