//! Login attempt tracking and temporary lockout.
//!
//! The attempt table is a field of an explicitly constructed service
//! object, never a process-wide static — tests run in isolation and
//! multiple principals can be simulated without cross-talk. The table
//! outlives individual sessions: it is the multi-session memory of abuse.
//!
//! Atomicity: the maximum-attempt check and the lockout establishment
//! happen under a single lock hold, so no concurrent check can slip
//! through on a "just expired" count that should have tipped into lockout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::error::SessionError;

/// Per-identity failure record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    /// Absolute unlock time while a lockout is active.
    pub locked_until_ms: Option<u64>,
}

/// Outcome of a pre-authentication check.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptDecision {
    /// Whether an authentication attempt may proceed.
    pub allowed: bool,
    /// Attempts left before lockout, when allowed.
    pub remaining_attempts: Option<u32>,
    /// Absolute unlock time, when denied.
    pub locked_until_ms: Option<u64>,
}

impl AttemptDecision {
    /// Result-shaped view for call sites that short-circuit on lockout.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RateLimited`] with the unlock time when the
    /// attempt was denied.
    pub fn ensure_allowed(&self) -> Result<(), SessionError> {
        if self.allowed {
            Ok(())
        } else {
            Err(SessionError::RateLimited {
                locked_until_ms: self.locked_until_ms.unwrap_or(u64::MAX),
            })
        }
    }
}

/// Failed-authentication tracker with time-bounded lockout.
pub struct LoginAttemptTracker {
    records: Mutex<HashMap<String, AttemptRecord>>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    lockout_duration_ms: u64,
}

impl LoginAttemptTracker {
    /// Create a tracker with the profile's attempt limit and lockout window.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, max_attempts: u32, lockout_duration_ms: u64) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
            max_attempts,
            lockout_duration_ms,
        }
    }

    /// Decide whether `identity` may attempt authentication right now.
    ///
    /// Establishes the lockout window atomically when the failure count
    /// has reached the maximum. An expired lockout reads as zero failures,
    /// but the stored count is only physically reset by the next failure
    /// or success.
    pub fn check_attempt(&self, identity: &str) -> AttemptDecision {
        let now = self.clock.now_ms();
        let Ok(mut records) = self.records.lock() else {
            // A poisoned table cannot be trusted to count — deny.
            return AttemptDecision {
                allowed: false,
                remaining_attempts: None,
                locked_until_ms: None,
            };
        };

        let Some(record) = records.get_mut(identity) else {
            return AttemptDecision {
                allowed: true,
                remaining_attempts: Some(self.max_attempts),
                locked_until_ms: None,
            };
        };

        if let Some(until) = record.locked_until_ms {
            if now < until {
                return AttemptDecision {
                    allowed: false,
                    remaining_attempts: None,
                    locked_until_ms: Some(until),
                };
            }
            // Lockout expired: treated as failureCount = 0 for this check.
            return AttemptDecision {
                allowed: true,
                remaining_attempts: Some(self.max_attempts),
                locked_until_ms: None,
            };
        }

        if record.failure_count >= self.max_attempts {
            let until = now.saturating_add(self.lockout_duration_ms);
            record.locked_until_ms = Some(until);
            tracing::warn!(identity, locked_until_ms = until, "login lockout established");
            return AttemptDecision {
                allowed: false,
                remaining_attempts: None,
                locked_until_ms: Some(until),
            };
        }

        AttemptDecision {
            allowed: true,
            remaining_attempts: Some(self.max_attempts.saturating_sub(record.failure_count)),
            locked_until_ms: None,
        }
    }

    /// Record a failed authentication attempt.
    ///
    /// Creates the record at 1 when absent. A failure after an expired
    /// lockout starts a fresh count.
    pub fn record_failure(&self, identity: &str) {
        let now = self.clock.now_ms();
        let Ok(mut records) = self.records.lock() else {
            return;
        };

        let record = records.entry(identity.to_owned()).or_insert(AttemptRecord {
            failure_count: 0,
            locked_until_ms: None,
        });

        match record.locked_until_ms {
            Some(until) if now >= until => {
                // Stale lockout — this failure is the first of a new streak.
                record.failure_count = 1;
                record.locked_until_ms = None;
            }
            _ => {
                record.failure_count = record.failure_count.saturating_add(1);
            }
        }
    }

    /// Forget an identity entirely. Called only after a verified
    /// successful authentication.
    pub fn clear(&self, identity: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.remove(identity);
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
