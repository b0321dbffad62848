//! `herse-session` — Client-side session security core for HERSE.
//!
//! Session state machine with inactivity locking, credential rate
//! limiting, secure encrypted key-value persistence, hardened outbound
//! requests, device trust, and the platform credential second factor.
//!
//! Server-side validation and authorization stay out of scope: everything
//! here hardens the client against local threats and keeps honest callers
//! honest, it never replaces checks the server must make.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod clock;
pub mod config;
pub mod error;
pub mod storage;
pub mod token;

pub mod session;

pub mod monitor;

pub mod rate_limit;

pub mod request;

pub mod device_trust;

pub mod credential;

pub mod flow;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SecurityParams, SecurityProfile};
pub use credential::{
    AssertionProof, CeremonyFailure, CredentialAssertionRequest, CredentialBridge,
    CredentialCreationRequest, PlatformAuthenticator, RegisteredCredential, COSE_ALG_ES256,
    COSE_ALG_RS256, MIN_CHALLENGE_LEN,
};
pub use device_trust::{DeviceTrustCache, TrustRecord};
pub use error::SessionError;
pub use flow::{LoginFlow, LoginStage};
pub use monitor::{InactivityMonitor, LockNotifier};
pub use rate_limit::{AttemptDecision, AttemptRecord, LoginAttemptTracker};
pub use request::{
    RequestHeaders, SecureRequestClient, CLIENT_VERSION_HEADER, CSRF_HEADER, NONCE_HEADER,
    TIMESTAMP_HEADER,
};
pub use session::{SessionManager, SessionState};
pub use storage::{MemoryStorage, SecureStore, StorageBackend, SECURE_PREFIX};
pub use token::{decode_claims, ensure_live, status, TokenClaims, TokenStatus};
