//! Session state machine — authentication liveness with race-condition guards.
//!
//! The state is recomputed from two inputs on every read: the bearer
//! token's liveness and the persisted state flag. Two invariants guard the
//! writers:
//!
//! - **token liveness wins** — while a structurally valid, unexpired token
//!   exists, the state can never be `Unauthenticated`; a write attempting it
//!   is redirected to `Authenticated` (self-healing against
//!   concurrent-writer races).
//! - **activity grace** — a transition into `LockedInactive` is rejected
//!   while the state is `Authenticated` and recorded activity is younger
//!   than the grace window (a delayed timer firing just after the user
//!   resumed).
//!
//! Both the inactivity monitor and user-triggered activity callbacks go
//! through [`SessionManager::set_state`] / [`SessionManager::record_activity`],
//! so their effects serialize deterministically regardless of interleaving.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::SecurityParams;
use crate::error::SessionError;
use crate::storage::{StorageBackend, SECURE_PREFIX};
use crate::token::{self, TokenStatus};

/// Storage key for the persisted state flag.
pub const STATE_KEY: &str = "hse.session_state";
/// Storage key for the last recorded activity timestamp (ms).
pub const LAST_ACTIVITY_KEY: &str = "hse.last_activity";
/// Storage key for the lock timestamp (present only while locked).
pub const LOCKED_AT_KEY: &str = "hse.locked_at";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Mutually exclusive session states — exactly one holds at any instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Actively authenticated.
    Authenticated,
    /// Locked after exceeding the inactivity timeout; activity unlocks.
    LockedInactive,
    /// Token present but its expiry has passed.
    Expired,
    /// Token present but not decodable.
    Invalid,
    /// No session.
    Unauthenticated,
}

impl SessionState {
    /// Stable string for persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::LockedInactive => "locked_inactive",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    /// Parse a persisted string; `None` for anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authenticated" => Some(Self::Authenticated),
            "locked_inactive" => Some(Self::LockedInactive),
            "expired" => Some(Self::Expired),
            "invalid" => Some(Self::Invalid),
            "unauthenticated" => Some(Self::Unauthenticated),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owner of the session state for one principal context.
///
/// All reads and writes are total: every call returns a defined state and
/// never propagates an internal error to the caller. When storage fails,
/// reads degrade to a pure token-presence check — fail-safe toward
/// `Unauthenticated` only when genuinely no token exists.
pub struct SessionManager {
    storage: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    params: SecurityParams,
    bearer_token: Mutex<Option<String>>,
}

impl SessionManager {
    /// Create a manager over the given storage, clock, and profile.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidProfile`] — fatal — when the
    /// configuration is provably corrupted.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        params: SecurityParams,
    ) -> Result<Self, SessionError> {
        params.validate()?;
        Ok(Self {
            storage,
            clock,
            params,
            bearer_token: Mutex::new(None),
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn params(&self) -> &SecurityParams {
        &self.params
    }

    // ── Token ──────────────────────────────────────────────────────

    /// Liveness of the currently held bearer token; `None` when no token.
    #[must_use]
    pub fn token_status(&self) -> Option<TokenStatus> {
        self.bearer_token
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|t| token::status(t, self.clock.now_ms())))
    }

    fn token_is_live(&self) -> bool {
        self.token_status() == Some(TokenStatus::Live)
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Current state, recomputed from token liveness + the persisted flag.
    ///
    /// Total: internal failures degrade to the token-presence fallback.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.compute_state().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "state recomputation failed, using token fallback");
            if self.token_status().is_some() {
                SessionState::Authenticated
            } else {
                SessionState::Unauthenticated
            }
        })
    }

    fn compute_state(&self) -> Result<SessionState, SessionError> {
        let persisted = self
            .storage
            .get(STATE_KEY)?
            .as_deref()
            .and_then(SessionState::parse);

        match self.token_status() {
            None => Ok(SessionState::Unauthenticated),
            Some(TokenStatus::Malformed) => Ok(SessionState::Invalid),
            Some(TokenStatus::Expired) => Ok(SessionState::Expired),
            Some(TokenStatus::Live) => match persisted {
                Some(SessionState::LockedInactive) => Ok(SessionState::LockedInactive),
                Some(SessionState::Authenticated) => Ok(SessionState::Authenticated),
                // Self-healing: a live token can never coexist with a
                // missing or `Unauthenticated` flag (stale `Expired` /
                // `Invalid` flags are equally contradicted by liveness).
                _ => {
                    self.storage
                        .set(STATE_KEY, SessionState::Authenticated.as_str())?;
                    Ok(SessionState::Authenticated)
                }
            },
        }
    }

    /// Convenience for UI gating: `true` only while `Authenticated`.
    /// A locked session keeps its token but cannot access features.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Last recorded activity, UNIX-epoch ms.
    #[must_use]
    pub fn last_activity_ms(&self) -> Option<u64> {
        self.read_timestamp(LAST_ACTIVITY_KEY)
    }

    /// When the session entered `LockedInactive`; present only while locked.
    #[must_use]
    pub fn locked_at_ms(&self) -> Option<u64> {
        self.read_timestamp(LOCKED_AT_KEY)
    }

    /// Milliseconds since the last recorded activity.
    #[must_use]
    pub fn idle_ms(&self) -> Option<u64> {
        self.last_activity_ms()
            .map(|last| self.clock.now_ms().saturating_sub(last))
    }

    fn read_timestamp(&self, key: &str) -> Option<u64> {
        self.storage
            .get(key)
            .ok()
            .flatten()
            .and_then(|s| s.parse().ok())
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Apply a state transition, enforcing the liveness and grace guards.
    ///
    /// Returns the state actually committed, which may differ from the
    /// requested one when an invariant intervenes. Total: persistence
    /// failures are logged, never propagated.
    pub fn set_state(&self, requested: SessionState) -> SessionState {
        let now = self.clock.now_ms();
        let current = self.state();

        // A live token redirects Unauthenticated to Authenticated.
        let next = if requested == SessionState::Unauthenticated && self.token_is_live() {
            SessionState::Authenticated
        } else {
            requested
        };

        // Reject a lock younger than the activity grace window.
        if next == SessionState::LockedInactive && current == SessionState::Authenticated {
            let idle = now.saturating_sub(self.last_activity_ms().unwrap_or(0));
            if idle < self.params.activity_grace_ms {
                tracing::debug!(idle_ms = idle, "lock rejected inside activity grace window");
                return current;
            }
        }

        match next {
            SessionState::Authenticated => {
                self.write(LAST_ACTIVITY_KEY, &now.to_string());
                self.remove(LOCKED_AT_KEY);
            }
            SessionState::LockedInactive => {
                self.write(LOCKED_AT_KEY, &now.to_string());
            }
            _ => {}
        }
        self.write(STATE_KEY, next.as_str());
        tracing::debug!(from = current.as_str(), to = next.as_str(), "session transition");
        next
    }

    /// Record a bearer token and enter `Authenticated`.
    pub fn authenticate(&self, bearer_token: &str) -> SessionState {
        if let Ok(mut guard) = self.bearer_token.lock() {
            *guard = Some(bearer_token.to_owned());
        }
        self.set_state(SessionState::Authenticated)
    }

    /// Stamp activity now; a locked session transitions back to
    /// `Authenticated` (activity unlocks).
    pub fn record_activity(&self) -> SessionState {
        let now = self.clock.now_ms();
        self.write(LAST_ACTIVITY_KEY, &now.to_string());
        if self.state() == SessionState::LockedInactive {
            return self.set_state(SessionState::Authenticated);
        }
        self.state()
    }

    /// Wipe all session-scoped state: token, persisted flags, and every
    /// encrypted record. The state afterwards is `Unauthenticated`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if part of the wipe failed; the
    /// wipe is still attempted in full before returning.
    pub fn terminate(&self) -> Result<(), SessionError> {
        if let Ok(mut guard) = self.bearer_token.lock() {
            *guard = None;
        }

        let mut first_error = None;
        for key in [STATE_KEY, LAST_ACTIVITY_KEY, LOCKED_AT_KEY] {
            if let Err(e) = self.storage.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        match self.storage.keys() {
            Ok(keys) => {
                for key in keys.iter().filter(|k| k.starts_with(SECURE_PREFIX)) {
                    if let Err(e) = self.storage.remove(key) {
                        first_error.get_or_insert(e);
                    }
                }
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            tracing::warn!(key, error = %e, "session state write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            tracing::warn!(key, error = %e, "session state delete failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
