//! Outbound request hardening.
//!
//! Headers produced here ride on whatever HTTP client the host wires in;
//! this layer never owns a socket. Transport encryption is the host's job.

use std::sync::{Arc, Mutex};

use data_encoding::BASE64URL_NOPAD;
use herse_crypto_core::{open, seal, EncryptedRecord, ScryptParams, SecretBuffer};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::clock::Clock;
use crate::error::SessionError;

/// Per-session anti-forgery token header.
pub const CSRF_HEADER: &str = "x-herse-csrf";
/// Per-request random nonce header.
pub const NONCE_HEADER: &str = "x-request-id";
/// Millisecond timestamp header (replay-window defense).
pub const TIMESTAMP_HEADER: &str = "x-request-timestamp";
/// Fixed client build identifier header.
pub const CLIENT_VERSION_HEADER: &str = "x-client-version";

/// Hardening headers a well-configured server should return.
const EXPECTED_RESPONSE_HEADERS: [&str; 3] = [
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
];

const CSRF_TOKEN_BYTES: usize = 32;
const NONCE_BYTES: usize = 16;

/// Headers to attach to one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub csrf_token: String,
    pub nonce: String,
    pub timestamp_ms: u64,
    pub client_version: String,
}

impl RequestHeaders {
    /// Flatten into `(name, value)` pairs for the host HTTP client.
    #[must_use]
    pub fn as_pairs(&self) -> [(&'static str, String); 4] {
        [
            (CSRF_HEADER, self.csrf_token.clone()),
            (NONCE_HEADER, self.nonce.clone()),
            (TIMESTAMP_HEADER, self.timestamp_ms.to_string()),
            (CLIENT_VERSION_HEADER, self.client_version.clone()),
        ]
    }
}

fn random_token(len: usize) -> Result<String, SessionError> {
    let mut raw = vec![0_u8; len];
    OsRng
        .try_fill_bytes(&mut raw)
        .map_err(|e| SessionError::Storage(format!("system RNG unavailable: {e}")))?;
    Ok(BASE64URL_NOPAD.encode(&raw))
}

/// Wraps outbound calls with anti-forgery and replay-defense headers and
/// inspects inbound responses for server hardening headers.
pub struct SecureRequestClient {
    csrf_token: Mutex<String>,
    clock: Arc<dyn Clock>,
    client_version: String,
}

impl SecureRequestClient {
    /// Create a client with a freshly generated CSRF token.
    ///
    /// # Errors
    ///
    /// Fails only if the system RNG is unavailable.
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, SessionError> {
        Ok(Self {
            csrf_token: Mutex::new(random_token(CSRF_TOKEN_BYTES)?),
            clock,
            client_version: env!("CARGO_PKG_VERSION").to_owned(),
        })
    }

    /// Replace the session CSRF token. Called on session (re-)initialization.
    ///
    /// # Errors
    ///
    /// Fails only if the system RNG is unavailable.
    pub fn rotate_csrf_token(&self) -> Result<(), SessionError> {
        let fresh = random_token(CSRF_TOKEN_BYTES)?;
        let mut guard = self
            .csrf_token
            .lock()
            .map_err(|_| SessionError::Storage("csrf token lock poisoned".into()))?;
        *guard = fresh;
        Ok(())
    }

    /// Build the header set for one outbound request: the session CSRF
    /// token, a fresh random nonce, the current timestamp, and the client
    /// build identifier.
    ///
    /// # Errors
    ///
    /// Fails only if the system RNG is unavailable.
    pub fn prepare(&self) -> Result<RequestHeaders, SessionError> {
        let csrf_token = self
            .csrf_token
            .lock()
            .map_err(|_| SessionError::Storage("csrf token lock poisoned".into()))?
            .clone();
        Ok(RequestHeaders {
            csrf_token,
            nonce: random_token(NONCE_BYTES)?,
            timestamp_ms: self.clock.now_ms(),
            client_version: self.client_version.clone(),
        })
    }

    /// Compare a presented token against the active one.
    ///
    /// Exact length and byte equality, compared in constant time; a prefix
    /// or truncation never matches.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CsrfMismatch`] when the tokens differ.
    pub fn verify_csrf(&self, presented: &str) -> Result<(), SessionError> {
        let guard = self
            .csrf_token
            .lock()
            .map_err(|_| SessionError::Storage("csrf token lock poisoned".into()))?;
        let expected = guard.as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return Err(SessionError::CsrfMismatch);
        }
        if expected.ct_eq(presented).into() {
            Ok(())
        } else {
            Err(SessionError::CsrfMismatch)
        }
    }

    /// Inspect a response's headers for expected server hardening.
    ///
    /// Missing headers are logged, never fatal: the server is a separate
    /// trust domain this layer cannot enforce against. Returns the names
    /// that were absent.
    pub fn inspect_response_headers<'a, I>(&self, headers: I) -> Vec<&'static str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: Vec<String> = headers
            .into_iter()
            .map(str::to_ascii_lowercase)
            .collect();
        let mut missing = Vec::new();
        for expected in EXPECTED_RESPONSE_HEADERS {
            if !present.iter().any(|h| h == expected) {
                tracing::warn!(header = expected, "response missing hardening header");
                missing.push(expected);
            }
        }
        missing
    }

    /// Encrypt a request payload for end-to-end confidentiality beyond
    /// transport security.
    ///
    /// # Errors
    ///
    /// Propagates envelope encryption failures.
    pub fn encrypt_payload(
        &self,
        plaintext: &[u8],
        master_key: &[u8],
        params: &ScryptParams,
    ) -> Result<EncryptedRecord, SessionError> {
        Ok(seal(plaintext, master_key, params)?)
    }

    /// Decrypt an end-to-end encrypted response payload.
    ///
    /// # Errors
    ///
    /// Propagates envelope decryption failures, including any tag mismatch.
    pub fn decrypt_response(
        &self,
        record: &EncryptedRecord,
        master_key: &[u8],
        params: &ScryptParams,
    ) -> Result<SecretBuffer, SessionError> {
        Ok(open(record, master_key, params)?)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
