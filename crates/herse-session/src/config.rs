//! Security profiles — environment-dependent configuration surface.
//!
//! The source of truth for every threshold in this crate: session timeout,
//! login attempt limits, password policy, second-factor requirement, trust
//! windows, and transport cookie flags. Two named presets replace the
//! legacy "dual code path" approach — call sites branch on values, never on
//! the environment.

use herse_crypto_core::kdf::KdfPreset;
use herse_crypto_core::policy::PasswordPolicy;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Named environment profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityProfile {
    /// Relaxed thresholds for an edit/run loop.
    Development,
    /// Production thresholds — every numeric tightened relative to
    /// Development: shorter timeouts, fewer attempts, longer lockout,
    /// longer minimum password.
    Hardened,
}

impl SecurityProfile {
    /// Materialize the full parameter set for this profile.
    #[must_use]
    pub fn params(self) -> SecurityParams {
        match self {
            Self::Development => SecurityParams {
                session_timeout_ms: 1_800_000, // 30 min idle
                monitor_interval_ms: 60_000,
                activity_grace_ms: 30_000,
                max_login_attempts: 5,
                lockout_duration_ms: 300_000, // 5 min
                password_min_length: 8,
                password_require_symbol: false,
                require_second_factor: false,
                device_trust_window_ms: 2_592_000_000, // 30 days
                ceremony_timeout_ms: 60_000,
                cookie_secure: false,
                cookie_same_site_strict: false,
                kdf_preset: KdfPreset::Interactive,
            },
            Self::Hardened => SecurityParams {
                session_timeout_ms: 900_000, // 15 min idle
                monitor_interval_ms: 30_000,
                activity_grace_ms: 30_000,
                max_login_attempts: 3,
                lockout_duration_ms: 900_000, // 15 min
                password_min_length: 12,
                password_require_symbol: true,
                require_second_factor: true,
                device_trust_window_ms: 604_800_000, // 7 days
                ceremony_timeout_ms: 30_000,
                cookie_secure: true,
                cookie_same_site_strict: true,
                kdf_preset: KdfPreset::Hardened,
            },
        }
    }
}

/// Full configuration surface, one instance per principal context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityParams {
    /// Idle time before the session locks.
    pub session_timeout_ms: u64,
    /// Inactivity monitor tick interval.
    pub monitor_interval_ms: u64,
    /// Window after recorded activity during which a lock request is
    /// rejected (delayed-timer race guard).
    pub activity_grace_ms: u64,
    /// Failed login attempts before lockout.
    pub max_login_attempts: u32,
    /// Lockout duration once the attempt limit is reached.
    pub lockout_duration_ms: u64,
    /// Minimum password length.
    pub password_min_length: usize,
    /// Whether passwords must contain a punctuation symbol.
    pub password_require_symbol: bool,
    /// Whether a second factor is required when the device is not trusted.
    pub require_second_factor: bool,
    /// How long a device trust record remains valid.
    pub device_trust_window_ms: u64,
    /// Timeout for platform credential ceremonies.
    pub ceremony_timeout_ms: u64,
    /// Transport flag: cookies only over TLS.
    pub cookie_secure: bool,
    /// Transport flag: `SameSite=Strict` on session cookies.
    pub cookie_same_site_strict: bool,
    /// KDF preset for envelope encryption.
    pub kdf_preset: KdfPreset,
}

impl SecurityParams {
    /// Reject a provably corrupted configuration.
    ///
    /// This is the one fatal error in the crate: initialization must abort
    /// rather than run with unsafe defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidProfile`] naming the offending field.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.session_timeout_ms == 0 {
            return Err(SessionError::InvalidProfile(
                "sessionTimeoutMs must be non-zero".into(),
            ));
        }
        if self.monitor_interval_ms == 0 || self.monitor_interval_ms >= self.session_timeout_ms {
            return Err(SessionError::InvalidProfile(
                "monitorIntervalMs must be non-zero and shorter than sessionTimeoutMs".into(),
            ));
        }
        if self.activity_grace_ms >= self.session_timeout_ms {
            return Err(SessionError::InvalidProfile(
                "activityGraceMs must be shorter than sessionTimeoutMs".into(),
            ));
        }
        if self.max_login_attempts == 0 {
            return Err(SessionError::InvalidProfile(
                "maxLoginAttempts must be non-zero".into(),
            ));
        }
        if self.lockout_duration_ms == 0 {
            return Err(SessionError::InvalidProfile(
                "lockoutDurationMs must be non-zero".into(),
            ));
        }
        if self.password_min_length == 0 {
            return Err(SessionError::InvalidProfile(
                "passwordMinLength must be non-zero".into(),
            ));
        }
        if self.ceremony_timeout_ms == 0 {
            return Err(SessionError::InvalidProfile(
                "ceremonyTimeoutMs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Password policy slice of this configuration.
    #[must_use]
    pub const fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy {
            min_length: self.password_min_length,
            require_symbol: self.password_require_symbol,
        }
    }
}
