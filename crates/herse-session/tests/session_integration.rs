#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! End-to-end session lifecycle: authenticate, idle-lock, resume, logout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use data_encoding::BASE64URL_NOPAD;
use herse_crypto_core::{ScryptParams, SecretBytes};
use herse_session::{
    Clock, InactivityMonitor, ManualClock, MemoryStorage, SecureStore, SecurityProfile,
    SessionManager, SessionState, StorageBackend, SECURE_PREFIX,
};

/// An unsigned token in the usual three-segment shape, expiring far in the
/// future of the manual clocks used here.
fn live_token() -> String {
    let header = BASE64URL_NOPAD.encode(br#"{"alg":"none"}"#);
    let payload = BASE64URL_NOPAD.encode(br#"{"exp": 4000000000, "sub": "alice"}"#);
    format!("{header}.{payload}.sig")
}

fn manager(
    storage: &Arc<MemoryStorage>,
    clock: &Arc<ManualClock>,
    profile: SecurityProfile,
) -> Arc<SessionManager> {
    Arc::new(
        SessionManager::new(
            Arc::clone(storage) as Arc<dyn StorageBackend>,
            Arc::clone(clock) as Arc<dyn Clock>,
            profile.params(),
        )
        .expect("profile params are valid"),
    )
}

#[test]
fn idle_session_locks_and_activity_unlocks() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(0));
    let manager = manager(&storage, &clock, SecurityProfile::Hardened);
    let timeout = manager.params().session_timeout_ms;

    manager.authenticate(&live_token());
    assert_eq!(manager.state(), SessionState::Authenticated);

    let fired = Arc::new(AtomicUsize::new(0));
    let notifier = {
        let fired = Arc::clone(&fired);
        Arc::new(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        }) as Arc<dyn Fn() + Send + Sync>
    };
    let monitor = InactivityMonitor::new(Arc::clone(&manager), notifier);

    // One millisecond past the timeout, the next tick locks.
    clock.advance(timeout + 1);
    monitor.check();
    assert_eq!(manager.state(), SessionState::LockedInactive);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(manager.locked_at_ms().is_some());

    // Further ticks stay silent while locked.
    clock.advance(timeout);
    monitor.check();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Activity unlocks and clears the lock stamp.
    manager.record_activity();
    assert_eq!(manager.state(), SessionState::Authenticated);
    assert_eq!(manager.locked_at_ms(), None);
    assert_eq!(manager.idle_ms(), Some(0));
}

#[test]
fn lock_refused_right_after_activity() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(0));
    let manager = manager(&storage, &clock, SecurityProfile::Hardened);
    let grace = manager.params().activity_grace_ms;

    manager.authenticate(&live_token());
    clock.advance(grace - 1);

    // A delayed lock request lands just inside the grace window.
    let committed = manager.set_state(SessionState::LockedInactive);
    assert_eq!(committed, SessionState::Authenticated);

    clock.advance(1);
    let committed = manager.set_state(SessionState::LockedInactive);
    assert_eq!(committed, SessionState::LockedInactive);
}

#[test]
fn live_token_always_overrides_unauthenticated_writes() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(0));
    let manager = manager(&storage, &clock, SecurityProfile::Development);

    manager.authenticate(&live_token());
    let committed = manager.set_state(SessionState::Unauthenticated);
    assert_eq!(committed, SessionState::Authenticated);
    assert_eq!(manager.state(), SessionState::Authenticated);
}

#[test]
fn terminate_wipes_session_and_encrypted_records() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(0));
    let manager = manager(&storage, &clock, SecurityProfile::Development);

    manager.authenticate(&live_token());

    // Persist an encrypted record alongside the session flags.
    let store = SecureStore::new(
        Arc::clone(&storage) as Arc<dyn StorageBackend>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        SecretBytes::new([7_u8; 32]),
        ScryptParams { log_n: 5, r: 8, p: 1 },
    );
    store.set_item("refresh", b"opaque").expect("set");
    assert_eq!(store.get_item("refresh"), Some(b"opaque".to_vec()));

    manager.terminate().expect("terminate");
    assert_eq!(manager.state(), SessionState::Unauthenticated);
    assert_eq!(store.get_item("refresh"), None);

    let leftover = storage.keys().expect("keys");
    assert!(
        leftover.iter().all(|k| !k.starts_with(SECURE_PREFIX)),
        "no encrypted records survive terminate: {leftover:?}"
    );
}

#[test]
fn tampered_record_reads_as_absent() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(0));
    let store = SecureStore::new(
        Arc::clone(&storage) as Arc<dyn StorageBackend>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        SecretBytes::new([7_u8; 32]),
        ScryptParams { log_n: 5, r: 8, p: 1 },
    );

    store.set_item("pin", b"4242").expect("set");
    let key = format!("{SECURE_PREFIX}pin");
    let raw = storage.get(&key).expect("get").expect("present");

    // Corrupt the serialized ciphertext in place.
    let tampered = raw.replacen("\"ciphertext\":[", "\"ciphertext\":[0,", 1);
    assert_ne!(raw, tampered, "serialized record contains a ciphertext field");
    storage.set(&key, &tampered).expect("set");

    assert_eq!(store.get_item("pin"), None);
}
