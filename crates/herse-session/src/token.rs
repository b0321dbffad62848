//! Bearer-token liveness checks.
//!
//! The token is decoded only far enough to read its expiry claim. The
//! signature is **not** verified — that would require distributing the
//! verifying key client-side. The server stays authoritative for every
//! authorization decision; this check is a UX optimization that lets the
//! client drop a session it already knows is dead.

use data_encoding::BASE64URL_NOPAD;
use serde::Deserialize;

use crate::error::SessionError;

/// The claims this layer reads. Everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the UNIX epoch (standard `exp` claim).
    #[serde(default)]
    pub exp: Option<u64>,
    /// Subject — the principal identifier, when present.
    #[serde(default)]
    pub sub: Option<String>,
}

/// Liveness verdict for a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Structurally valid with no expiry in the past.
    Live,
    /// Structurally valid but the `exp` claim has passed.
    Expired,
    /// Not decodable as a three-part base64url token with a JSON payload.
    Malformed,
}

/// Decode the payload claims of a JWT-shaped bearer token.
///
/// # Errors
///
/// Returns [`SessionError::TokenMalformed`] if the token is not three
/// dot-separated segments, the payload is not valid base64url, or the
/// decoded payload is not JSON.
pub fn decode_claims(token: &str) -> Result<TokenClaims, SessionError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionError::TokenMalformed(
            "expected three dot-separated segments".into(),
        ));
    };

    let decoded = BASE64URL_NOPAD
        .decode(payload.as_bytes())
        .map_err(|e| SessionError::TokenMalformed(format!("payload base64: {e}")))?;

    serde_json::from_slice(&decoded)
        .map_err(|e| SessionError::TokenMalformed(format!("payload JSON: {e}")))
}

/// Compute the liveness of a token at the given instant.
///
/// A token without an `exp` claim is treated as live — expiry is then
/// entirely the server's concern.
#[must_use]
pub fn status(token: &str, now_ms: u64) -> TokenStatus {
    match decode_claims(token) {
        Err(_) => TokenStatus::Malformed,
        Ok(claims) => match claims.exp {
            None => TokenStatus::Live,
            // exp is in seconds; everything else in this crate is ms.
            Some(exp) => {
                if exp.saturating_mul(1_000) > now_ms {
                    TokenStatus::Live
                } else {
                    TokenStatus::Expired
                }
            }
        },
    }
}

/// Result-shaped liveness check for call sites that refuse to proceed
/// with a dead token.
///
/// # Errors
///
/// [`SessionError::TokenExpired`] for a past `exp` claim,
/// [`SessionError::TokenMalformed`] for anything undecodable.
pub fn ensure_live(token: &str, now_ms: u64) -> Result<(), SessionError> {
    match status(token, now_ms) {
        TokenStatus::Live => Ok(()),
        TokenStatus::Expired => Err(SessionError::TokenExpired),
        TokenStatus::Malformed => {
            // Re-decode to surface the specific parse failure.
            decode_claims(token)?;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
