//! Composite login flow.
//!
//! Ties the attempt tracker, device trust cache, and security profile into
//! one small state machine driving the login UI:
//!
//! ```text
//! NoSession -> Checking -> { Locked(until) | AwaitingSecondFactor | Authenticated }
//! ```
//!
//! `Authenticated` is terminal. `Locked` is time-bounded and reads back as
//! `Checking` once its window elapses.

use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::config::SecurityParams;
use crate::device_trust::DeviceTrustCache;
use crate::rate_limit::LoginAttemptTracker;

/// Where a login attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    /// Nothing submitted yet.
    NoSession,
    /// Credentials may be submitted.
    Checking,
    /// Rate-limited until the embedded unlock time.
    Locked { until_ms: u64 },
    /// Primary credential accepted; a second factor is still required.
    AwaitingSecondFactor,
    /// Fully authenticated.
    Authenticated,
}

/// Drives one identity/device pair through the login stages.
pub struct LoginFlow {
    tracker: Arc<LoginAttemptTracker>,
    trust: Arc<DeviceTrustCache>,
    clock: Arc<dyn Clock>,
    require_second_factor: bool,
    stage: Mutex<LoginStage>,
    pending: Mutex<Option<(String, String)>>,
}

impl LoginFlow {
    #[must_use]
    pub fn new(
        tracker: Arc<LoginAttemptTracker>,
        trust: Arc<DeviceTrustCache>,
        clock: Arc<dyn Clock>,
        params: &SecurityParams,
    ) -> Self {
        Self {
            tracker,
            trust,
            clock,
            require_second_factor: params.require_second_factor,
            stage: Mutex::new(LoginStage::NoSession),
            pending: Mutex::new(None),
        }
    }

    /// Current stage, with lockout expiry applied: a `Locked` stage whose
    /// window has elapsed reads back as `Checking`.
    #[must_use]
    pub fn stage(&self) -> LoginStage {
        let Ok(mut stage) = self.stage.lock() else {
            return LoginStage::NoSession;
        };
        if let LoginStage::Locked { until_ms } = *stage {
            if self.clock.now_ms() >= until_ms {
                *stage = LoginStage::Checking;
            }
        }
        *stage
    }

    /// Open the flow for credential submission.
    pub fn begin(&self) {
        if let Ok(mut stage) = self.stage.lock() {
            if *stage == LoginStage::NoSession {
                *stage = LoginStage::Checking;
            }
        }
    }

    /// Feed one primary-credential verification outcome into the flow.
    ///
    /// `credential_verified` is the caller's verdict on the submitted
    /// credentials; this flow only decides what that verdict means given
    /// the rate-limit and device-trust context. Returns the stage the flow
    /// settled in. `Authenticated` is terminal: a stray re-submission is
    /// ignored, as is any submission while a lockout is live.
    pub fn submit(&self, identity: &str, device_id: &str, credential_verified: bool) -> LoginStage {
        match self.stage() {
            LoginStage::Locked { until_ms } => return LoginStage::Locked { until_ms },
            LoginStage::Authenticated => return LoginStage::Authenticated,
            _ => {}
        }

        let decision = self.tracker.check_attempt(identity);
        if !decision.allowed {
            let until_ms = decision.locked_until_ms.unwrap_or_else(|| self.clock.now_ms());
            self.set_stage(LoginStage::Locked { until_ms });
            return LoginStage::Locked { until_ms };
        }

        if !credential_verified {
            self.tracker.record_failure(identity);
            // The failure that exhausts the budget locks immediately.
            let after = self.tracker.check_attempt(identity);
            if let Some(until_ms) = after.locked_until_ms {
                self.set_stage(LoginStage::Locked { until_ms });
                return LoginStage::Locked { until_ms };
            }
            self.set_stage(LoginStage::Checking);
            return LoginStage::Checking;
        }

        self.tracker.clear(identity);

        if self.require_second_factor && !self.trust.is_trusted(identity, device_id) {
            if let Ok(mut pending) = self.pending.lock() {
                *pending = Some((identity.to_owned(), device_id.to_owned()));
            }
            self.set_stage(LoginStage::AwaitingSecondFactor);
            return LoginStage::AwaitingSecondFactor;
        }

        self.set_stage(LoginStage::Authenticated);
        LoginStage::Authenticated
    }

    /// Feed the second-factor ceremony outcome into the flow.
    ///
    /// Success authenticates and trusts the device so the next login on it
    /// can skip the ceremony. Failure returns to `Checking` without
    /// touching the attempt budget: the primary credential was already
    /// verified.
    pub fn complete_second_factor(&self, success: bool) -> LoginStage {
        if self.stage() != LoginStage::AwaitingSecondFactor {
            return self.stage();
        }
        let pending = self
            .pending
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if success {
            if let Some((identity, device_id)) = pending {
                self.trust.trust(&identity, &device_id);
            }
            self.set_stage(LoginStage::Authenticated);
            LoginStage::Authenticated
        } else {
            self.set_stage(LoginStage::Checking);
            LoginStage::Checking
        }
    }

    /// Attempts left before lockout for this identity, for the login UI.
    /// `None` while a lockout is active.
    #[must_use]
    pub fn remaining_attempts(&self, identity: &str) -> Option<u32> {
        self.tracker.check_attempt(identity).remaining_attempts
    }

    /// Reset to `NoSession`, e.g. after logout.
    pub fn reset(&self) {
        self.set_stage(LoginStage::NoSession);
        if let Ok(mut pending) = self.pending.lock() {
            *pending = None;
        }
    }

    fn set_stage(&self, next: LoginStage) {
        if let Ok(mut stage) = self.stage.lock() {
            *stage = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
