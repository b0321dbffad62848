//! Platform credential bridge (second factor).
//!
//! The host owns the actual authenticator hardware and its UI; this module
//! only builds well-formed ceremony requests and translates host outcomes
//! into typed failures. "Not available" (no capability) is a distinct
//! condition from "rejected" (capability present, ceremony failed).

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::SessionError;

/// Minimum ceremony challenge length in bytes.
pub const MIN_CHALLENGE_LEN: usize = 32;

/// COSE algorithm identifier for ECDSA with SHA-256.
pub const COSE_ALG_ES256: i32 = -7;
/// COSE algorithm identifier for RSASSA-PKCS1-v1_5 with SHA-256.
pub const COSE_ALG_RS256: i32 = -257;

/// Why a ceremony failed, as reported by the host authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyFailure {
    /// The user dismissed the prompt.
    Cancelled,
    /// The authenticator or platform policy refused the request.
    PolicyDenied(String),
    /// The ceremony did not complete within the allotted time.
    TimedOut,
}

/// Request for creating a new platform credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCreationRequest {
    pub challenge: Vec<u8>,
    pub relying_party_id: String,
    pub relying_party_name: String,
    pub principal_id: String,
    pub display_name: String,
    /// Accepted signature algorithms, in preference order.
    pub algorithms: Vec<i32>,
    pub require_user_verification: bool,
    pub prefer_platform_attachment: bool,
    pub timeout_ms: u64,
}

/// Request for asserting an existing platform credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAssertionRequest {
    pub challenge: Vec<u8>,
    pub relying_party_id: String,
    pub credential_id: Vec<u8>,
    pub require_user_verification: bool,
    pub timeout_ms: u64,
}

/// A credential the host confirmed as registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCredential {
    pub credential_id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub algorithm: i32,
}

/// Host confirmation of a completed assertion ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionProof {
    pub credential_id: Vec<u8>,
    pub signature: Vec<u8>,
    pub authenticator_data: Vec<u8>,
}

/// Host-side authenticator capability.
///
/// The production implementation is wired in by the embedding shell; tests
/// use a scripted fake.
pub trait PlatformAuthenticator: Send + Sync {
    /// Whether the host exposes a platform authenticator at all.
    fn probe(&self) -> bool;

    /// Run the credential-creation ceremony.
    ///
    /// # Errors
    ///
    /// Returns a [`CeremonyFailure`] for cancellation, policy denial, or
    /// timeout.
    fn create(
        &self,
        request: &CredentialCreationRequest,
    ) -> Result<RegisteredCredential, CeremonyFailure>;

    /// Run the credential-assertion ceremony.
    ///
    /// # Errors
    ///
    /// Returns a [`CeremonyFailure`] for cancellation, policy denial, or
    /// timeout.
    fn get_assertion(
        &self,
        request: &CredentialAssertionRequest,
    ) -> Result<AssertionProof, CeremonyFailure>;
}

fn fresh_challenge() -> Result<Vec<u8>, SessionError> {
    let mut challenge = vec![0_u8; MIN_CHALLENGE_LEN];
    OsRng
        .try_fill_bytes(&mut challenge)
        .map_err(|e| SessionError::Storage(format!("system RNG unavailable: {e}")))?;
    Ok(challenge)
}

fn map_failure(failure: CeremonyFailure) -> SessionError {
    match failure {
        CeremonyFailure::Cancelled => {
            SessionError::CeremonyRejected("user cancelled the ceremony".into())
        }
        CeremonyFailure::PolicyDenied(reason) => SessionError::CeremonyRejected(reason),
        CeremonyFailure::TimedOut => SessionError::CeremonyTimeout,
    }
}

/// Builds ceremony requests bound to the serving origin and drives them
/// through the host authenticator.
pub struct CredentialBridge {
    authenticator: Box<dyn PlatformAuthenticator>,
    origin: String,
    display_origin: String,
    ceremony_timeout_ms: u64,
}

impl CredentialBridge {
    #[must_use]
    pub fn new(
        authenticator: Box<dyn PlatformAuthenticator>,
        origin: impl Into<String>,
        ceremony_timeout_ms: u64,
    ) -> Self {
        let origin = origin.into();
        Self {
            display_origin: origin.clone(),
            authenticator,
            origin,
            ceremony_timeout_ms,
        }
    }

    /// Whether the host exposes a platform authenticator capability.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.authenticator.probe()
    }

    /// Register a new platform credential for `principal_id`.
    ///
    /// The request carries a fresh random challenge, binds the relying
    /// party to the serving origin, requires user verification, and
    /// prefers a platform-attached authenticator.
    ///
    /// # Errors
    ///
    /// [`SessionError::AuthenticatorUnavailable`] when the capability is
    /// absent, [`SessionError::CeremonyRejected`] on user cancel or policy
    /// denial, [`SessionError::CeremonyTimeout`] when the host reports a
    /// timeout.
    pub fn register(
        &self,
        principal_id: &str,
        display_name: &str,
    ) -> Result<RegisteredCredential, SessionError> {
        if !self.authenticator.probe() {
            return Err(SessionError::AuthenticatorUnavailable);
        }
        let request = CredentialCreationRequest {
            challenge: fresh_challenge()?,
            relying_party_id: self.origin.clone(),
            relying_party_name: self.display_origin.clone(),
            principal_id: principal_id.to_owned(),
            display_name: display_name.to_owned(),
            algorithms: vec![COSE_ALG_ES256, COSE_ALG_RS256],
            require_user_verification: true,
            prefer_platform_attachment: true,
            timeout_ms: self.ceremony_timeout_ms,
        };
        self.authenticator.create(&request).map_err(map_failure)
    }

    /// Assert a previously registered credential.
    ///
    /// # Errors
    ///
    /// Same failure mapping as [`CredentialBridge::register`].
    pub fn authenticate(&self, credential_id: &[u8]) -> Result<AssertionProof, SessionError> {
        if !self.authenticator.probe() {
            return Err(SessionError::AuthenticatorUnavailable);
        }
        let request = CredentialAssertionRequest {
            challenge: fresh_challenge()?,
            relying_party_id: self.origin.clone(),
            credential_id: credential_id.to_vec(),
            require_user_verification: true,
            timeout_ms: self.ceremony_timeout_ms,
        };
        self.authenticator
            .get_assertion(&request)
            .map_err(map_failure)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Scripted host authenticator that records the requests it sees.
    struct FakeAuthenticator {
        available: bool,
        create_outcome: Option<CeremonyFailure>,
        assert_outcome: Option<CeremonyFailure>,
        seen_challenges: Mutex<Vec<Vec<u8>>>,
        seen_creations: Mutex<Vec<CredentialCreationRequest>>,
    }

    impl FakeAuthenticator {
        fn available() -> Self {
            Self {
                available: true,
                create_outcome: None,
                assert_outcome: None,
                seen_challenges: Mutex::new(Vec::new()),
                seen_creations: Mutex::new(Vec::new()),
            }
        }

        fn absent() -> Self {
            Self {
                available: false,
                ..Self::available()
            }
        }
    }

    impl PlatformAuthenticator for FakeAuthenticator {
        fn probe(&self) -> bool {
            self.available
        }

        fn create(
            &self,
            request: &CredentialCreationRequest,
        ) -> Result<RegisteredCredential, CeremonyFailure> {
            self.seen_challenges
                .lock()
                .expect("lock")
                .push(request.challenge.clone());
            self.seen_creations
                .lock()
                .expect("lock")
                .push(request.clone());
            if let Some(failure) = &self.create_outcome {
                return Err(failure.clone());
            }
            Ok(RegisteredCredential {
                credential_id: vec![0xAB; 16],
                public_key: vec![0xCD; 65],
                algorithm: COSE_ALG_ES256,
            })
        }

        fn get_assertion(
            &self,
            request: &CredentialAssertionRequest,
        ) -> Result<AssertionProof, CeremonyFailure> {
            self.seen_challenges
                .lock()
                .expect("lock")
                .push(request.challenge.clone());
            if let Some(failure) = &self.assert_outcome {
                return Err(failure.clone());
            }
            Ok(AssertionProof {
                credential_id: request.credential_id.clone(),
                signature: vec![0x01; 64],
                authenticator_data: vec![0x02; 37],
            })
        }
    }

    /// Shares one authenticator between the bridge and test assertions.
    struct Shared(std::sync::Arc<FakeAuthenticator>);

    impl PlatformAuthenticator for Shared {
        fn probe(&self) -> bool {
            self.0.probe()
        }
        fn create(
            &self,
            request: &CredentialCreationRequest,
        ) -> Result<RegisteredCredential, CeremonyFailure> {
            self.0.create(request)
        }
        fn get_assertion(
            &self,
            request: &CredentialAssertionRequest,
        ) -> Result<AssertionProof, CeremonyFailure> {
            self.0.get_assertion(request)
        }
    }

    const ORIGIN: &str = "vault.example.com";
    const TIMEOUT_MS: u64 = 30_000;

    #[test]
    fn absent_capability_is_unavailable_not_rejected() {
        let bridge = CredentialBridge::new(Box::new(FakeAuthenticator::absent()), ORIGIN, TIMEOUT_MS);
        assert!(!bridge.is_available());
        assert!(matches!(
            bridge.register("alice", "Alice"),
            Err(SessionError::AuthenticatorUnavailable)
        ));
        assert!(matches!(
            bridge.authenticate(&[0xAB; 16]),
            Err(SessionError::AuthenticatorUnavailable)
        ));
    }

    #[test]
    fn register_binds_origin_and_hardening_options() {
        let fake = std::sync::Arc::new(FakeAuthenticator::available());
        let bridge = CredentialBridge::new(
            Box::new(Shared(std::sync::Arc::clone(&fake))),
            ORIGIN,
            TIMEOUT_MS,
        );
        bridge.register("alice", "Alice").expect("register");

        let seen = fake.seen_creations.lock().expect("lock");
        let request = seen.first().expect("request seen");
        assert_eq!(request.relying_party_id, ORIGIN);
        assert_eq!(request.principal_id, "alice");
        assert!(request.require_user_verification);
        assert!(request.prefer_platform_attachment);
        assert_eq!(request.algorithms, vec![COSE_ALG_ES256, COSE_ALG_RS256]);
        assert!(request.challenge.len() >= MIN_CHALLENGE_LEN);
        assert_eq!(request.timeout_ms, TIMEOUT_MS);
    }

    #[test]
    fn successful_register_returns_the_host_credential() {
        let bridge =
            CredentialBridge::new(Box::new(FakeAuthenticator::available()), ORIGIN, TIMEOUT_MS);
        let credential = bridge.register("alice", "Alice").expect("register");
        assert_eq!(credential.algorithm, COSE_ALG_ES256);
        assert!(!credential.credential_id.is_empty());
    }

    #[test]
    fn assertion_carries_the_requested_credential_id() {
        let bridge =
            CredentialBridge::new(Box::new(FakeAuthenticator::available()), ORIGIN, TIMEOUT_MS);
        let proof = bridge.authenticate(&[0x42; 16]).expect("assert");
        assert_eq!(proof.credential_id, vec![0x42; 16]);
    }

    #[test]
    fn challenges_are_fresh_per_ceremony() {
        let fake = std::sync::Arc::new(FakeAuthenticator::available());
        let bridge = CredentialBridge::new(
            Box::new(Shared(std::sync::Arc::clone(&fake))),
            ORIGIN,
            TIMEOUT_MS,
        );

        bridge.register("alice", "Alice").expect("register");
        bridge.authenticate(&[0xAB; 16]).expect("assert");

        let challenges = fake.seen_challenges.lock().expect("lock");
        assert_eq!(challenges.len(), 2);
        assert_ne!(challenges[0], challenges[1]);
    }

    #[test]
    fn cancellation_maps_to_rejected() {
        let fake = FakeAuthenticator {
            create_outcome: Some(CeremonyFailure::Cancelled),
            ..FakeAuthenticator::available()
        };
        let bridge = CredentialBridge::new(Box::new(fake), ORIGIN, TIMEOUT_MS);
        assert!(matches!(
            bridge.register("alice", "Alice"),
            Err(SessionError::CeremonyRejected(_))
        ));
    }

    #[test]
    fn policy_denial_preserves_the_reason() {
        let fake = FakeAuthenticator {
            assert_outcome: Some(CeremonyFailure::PolicyDenied("attestation required".into())),
            ..FakeAuthenticator::available()
        };
        let bridge = CredentialBridge::new(Box::new(fake), ORIGIN, TIMEOUT_MS);
        match bridge.authenticate(&[0xAB; 16]) {
            Err(SessionError::CeremonyRejected(reason)) => {
                assert_eq!(reason, "attestation required");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn timeout_maps_to_its_own_variant() {
        let fake = FakeAuthenticator {
            create_outcome: Some(CeremonyFailure::TimedOut),
            ..FakeAuthenticator::available()
        };
        let bridge = CredentialBridge::new(Box::new(fake), ORIGIN, TIMEOUT_MS);
        assert!(matches!(
            bridge.register("alice", "Alice"),
            Err(SessionError::CeremonyTimeout)
        ));
    }
}
