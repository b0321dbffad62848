//! Password policy evaluation.
//!
//! [`PasswordPolicy::validate`] is a pure rule evaluator: no state, no side
//! effects, safe to call on every keystroke. Every violated rule is
//! reported, not just the first, so the UI can show the full checklist.

use serde::{Deserialize, Serialize};

/// Punctuation characters accepted as symbols.
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}|;:',.<>?/~";

/// Length of an identical-character run that fails validation.
const MAX_REPEAT_RUN: usize = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Credential strength rules, supplied by the active security profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
    /// Minimum password length (e.g. 8 in development, 12 hardened).
    pub min_length: usize,
    /// Whether a punctuation symbol is required.
    pub require_symbol: bool,
}

/// One violated rule. A password may violate several at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyViolation {
    /// Shorter than the configured minimum.
    TooShort {
        /// The configured minimum length.
        min: usize,
    },
    /// No uppercase letter.
    MissingUppercase,
    /// No lowercase letter.
    MissingLowercase,
    /// No digit.
    MissingDigit,
    /// No symbol from the accepted punctuation set.
    MissingSymbol,
    /// Three or more identical consecutive characters.
    RepeatedRun,
}

/// Outcome of a policy check: overall verdict plus every violated rule.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyReport {
    /// `true` when no rule was violated.
    pub valid: bool,
    /// All violated rules, in evaluation order.
    pub violations: Vec<PolicyViolation>,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

impl PasswordPolicy {
    /// Evaluate `password` against this policy.
    ///
    /// Each rule is checked independently — a short, all-lowercase password
    /// reports both `TooShort` and `MissingUppercase`.
    pub fn validate(&self, password: &str) -> PolicyReport {
        let mut violations = Vec::new();

        if password.chars().count() < self.min_length {
            violations.push(PolicyViolation::TooShort {
                min: self.min_length,
            });
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(PolicyViolation::MissingUppercase);
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push(PolicyViolation::MissingLowercase);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PolicyViolation::MissingDigit);
        }
        if self.require_symbol && !password.bytes().any(|b| SYMBOLS.contains(&b)) {
            violations.push(PolicyViolation::MissingSymbol);
        }
        if has_repeated_run(password) {
            violations.push(PolicyViolation::RepeatedRun);
        }

        PolicyReport {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// Detect a run of [`MAX_REPEAT_RUN`] or more identical consecutive characters.
fn has_repeated_run(password: &str) -> bool {
    let mut run = 1usize;
    let mut prev: Option<char> = None;
    for c in password.chars() {
        if prev == Some(c) {
            run = run.saturating_add(1);
            if run >= MAX_REPEAT_RUN {
                return true;
            }
        } else {
            run = 1;
        }
        prev = Some(c);
    }
    false
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
