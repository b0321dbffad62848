//! Per-device trust cache for second-factor skipping.
//!
//! Trust is a cache, never authoritative: losing a record only removes a
//! convenience skip, never access. Records outlive sessions and decay on
//! their own validity window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;

/// One trust grant for a (principal, device) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustRecord {
    /// When the grant was made.
    pub trusted_at_ms: u64,
    /// How long the grant remains valid.
    pub validity_window_ms: u64,
}

impl TrustRecord {
    fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.trusted_at_ms.saturating_add(self.validity_window_ms)
    }
}

/// Decaying (principal, device) trust table.
pub struct DeviceTrustCache {
    records: Mutex<HashMap<(String, String), TrustRecord>>,
    clock: Arc<dyn Clock>,
    default_window_ms: u64,
}

impl DeviceTrustCache {
    /// Create a cache whose grants default to the profile's trust window.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, default_window_ms: u64) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
            default_window_ms,
        }
    }

    /// Upsert a fresh trust grant for the pair, stamped now.
    pub fn trust(&self, principal_id: &str, device_id: &str) {
        let record = TrustRecord {
            trusted_at_ms: self.clock.now_ms(),
            validity_window_ms: self.default_window_ms,
        };
        if let Ok(mut records) = self.records.lock() {
            records.insert((principal_id.to_owned(), device_id.to_owned()), record);
        }
    }

    /// True only while a grant exists and its window has not elapsed.
    #[must_use]
    pub fn is_trusted(&self, principal_id: &str, device_id: &str) -> bool {
        let now = self.clock.now_ms();
        let Ok(records) = self.records.lock() else {
            return false;
        };
        records
            .get(&(principal_id.to_owned(), device_id.to_owned()))
            .is_some_and(|r| r.is_live(now))
    }

    /// Drop one grant, if present.
    pub fn revoke(&self, principal_id: &str, device_id: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.remove(&(principal_id.to_owned(), device_id.to_owned()));
        }
    }

    /// Drop every grant whose window has elapsed. Returns how many were
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let Ok(mut records) = self.records.lock() else {
            return 0;
        };
        let before = records.len();
        records.retain(|_, r| r.is_live(now));
        before.saturating_sub(records.len())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
