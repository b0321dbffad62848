//! Durable storage capability and the encrypted key-value store.
//!
//! The host's per-origin durable storage is an external, non-deterministic
//! collaborator, so it sits behind the narrow [`StorageBackend`] trait —
//! the real host binding is an adapter, and tests run against
//! [`MemoryStorage`].
//!
//! [`SecureStore`] layers envelope encryption on top: values are sealed on
//! write and authenticated on read. A record that fails authentication is
//! indistinguishable from one that was never written — callers get `None`,
//! and the violation is reported on the error channel (`tracing`) for
//! monitoring.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use herse_crypto_core::envelope::{self, EncryptedRecord};
use herse_crypto_core::kdf::ScryptParams;
use herse_crypto_core::memory::SecretBytes;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::SessionError;

/// Namespace prefix for encrypted records in host storage.
pub const SECURE_PREFIX: &str = "hse.sec.";

// ---------------------------------------------------------------------------
// Storage capability
// ---------------------------------------------------------------------------

/// Narrow capability interface over the host's durable key-value storage.
pub trait StorageBackend: Send + Sync {
    /// Read a value, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] on host I/O failure.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Write a value, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] on host I/O failure.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Delete a value. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] on host I/O failure.
    fn remove(&self, key: &str) -> Result<(), SessionError>;

    /// All currently stored keys.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] on host I/O failure.
    fn keys(&self) -> Result<Vec<String>, SessionError>;
}

/// In-process backend — the test double and the default for hosts without
/// durable storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, SessionError> {
        self.entries
            .lock()
            .map_err(|_| SessionError::Storage("storage mutex poisoned".into()))
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Secure store
// ---------------------------------------------------------------------------

/// Value envelope persisted inside each encrypted record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredValue {
    /// The caller's opaque payload.
    value: Vec<u8>,
    /// Write timestamp, UNIX-epoch milliseconds.
    written_at_ms: u64,
}

/// Encrypted key-value store over a [`StorageBackend`].
///
/// Every write seals a fresh [`EncryptedRecord`] (new salt + IV per call);
/// every read authenticates before returning. Keys are namespaced under
/// [`SECURE_PREFIX`].
pub struct SecureStore {
    storage: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    master_key: SecretBytes<32>,
    kdf_params: ScryptParams,
}

impl SecureStore {
    /// Create a store bound to the given backend and master key.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        master_key: SecretBytes<32>,
        kdf_params: ScryptParams,
    ) -> Self {
        Self {
            storage,
            clock,
            master_key,
            kdf_params,
        }
    }

    fn storage_key(key: &str) -> String {
        format!("{SECURE_PREFIX}{key}")
    }

    /// Encrypt and persist a value under the given key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Crypto`] if sealing fails or
    /// [`SessionError::Storage`] if the host write fails.
    pub fn set_item(&self, key: &str, value: &[u8]) -> Result<(), SessionError> {
        let stored = StoredValue {
            value: value.to_vec(),
            written_at_ms: self.clock.now_ms(),
        };
        let plaintext = serde_json::to_vec(&stored)
            .map_err(|e| SessionError::Storage(format!("value serialization failed: {e}")))?;
        let record = envelope::seal(&plaintext, self.master_key.expose(), &self.kdf_params)?;
        let serialized = serde_json::to_string(&record)
            .map_err(|e| SessionError::Storage(format!("record serialization failed: {e}")))?;
        self.storage.set(&Self::storage_key(key), &serialized)
    }

    /// Read, authenticate, and decrypt a value.
    ///
    /// Total: a tampered, corrupted, or unreadable record yields `None`,
    /// exactly like a key that was never written. The integrity violation
    /// is still reported as a `warn!` security event so it stays
    /// observable.
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<Vec<u8>> {
        let raw = match self.storage.get(&Self::storage_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "secure store read failed");
                return None;
            }
        };

        let record: EncryptedRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key, error = %e, "secure store record corrupted");
                return None;
            }
        };

        let plaintext = match envelope::open(&record, self.master_key.expose(), &self.kdf_params) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                // Auth-tag mismatch or unknown version — a security event,
                // not a caller-visible error.
                tracing::warn!(key, error = %e, "secure store integrity violation");
                return None;
            }
        };

        match serde_json::from_slice::<StoredValue>(plaintext.expose()) {
            Ok(stored) => Some(stored.value),
            Err(e) => {
                tracing::warn!(key, error = %e, "secure store payload corrupted");
                None
            }
        }
    }

    /// Delete a single record. No re-encryption needed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] on host I/O failure.
    pub fn remove_item(&self, key: &str) -> Result<(), SessionError> {
        self.storage.remove(&Self::storage_key(key))
    }

    /// Delete every record under the secure namespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] on host I/O failure.
    pub fn clear(&self) -> Result<(), SessionError> {
        for key in self.storage.keys()? {
            if key.starts_with(SECURE_PREFIX) {
                self.storage.remove(&key)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const TEST_PARAMS: ScryptParams = ScryptParams {
        log_n: 5,
        r: 8,
        p: 1,
    };

    fn test_store() -> (Arc<MemoryStorage>, SecureStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SecureStore::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            Arc::new(ManualClock::new(1_000)),
            SecretBytes::new([0xAA; 32]),
            TEST_PARAMS,
        );
        (storage, store)
    }

    #[test]
    fn set_get_roundtrip() {
        let (_storage, store) = test_store();
        store.set_item("profile", b"payload").expect("set");
        assert_eq!(store.get_item("profile"), Some(b"payload".to_vec()));
    }

    #[test]
    fn absent_key_is_none() {
        let (_storage, store) = test_store();
        assert_eq!(store.get_item("missing"), None);
    }

    #[test]
    fn persisted_value_is_not_plaintext() {
        let (storage, store) = test_store();
        store.set_item("profile", b"super secret payload").expect("set");
        let raw = storage
            .get("hse.sec.profile")
            .expect("get")
            .expect("present");
        assert!(!raw.contains("super secret payload"));
    }

    #[test]
    fn tampered_record_reads_as_absent() {
        let (storage, store) = test_store();
        store.set_item("profile", b"payload").expect("set");

        // Corrupt the stored ciphertext.
        let raw = storage
            .get("hse.sec.profile")
            .expect("get")
            .expect("present");
        let mut record: EncryptedRecord = serde_json::from_str(&raw).expect("parse");
        if let Some(byte) = record.ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        let tampered = serde_json::to_string(&record).expect("serialize");
        storage.set("hse.sec.profile", &tampered).expect("set");

        assert_eq!(store.get_item("profile"), None);
    }

    #[test]
    fn garbage_record_reads_as_absent() {
        let (storage, store) = test_store();
        storage.set("hse.sec.profile", "not json at all").expect("set");
        assert_eq!(store.get_item("profile"), None);
    }

    #[test]
    fn overwrite_produces_fresh_record() {
        let (storage, store) = test_store();
        store.set_item("profile", b"payload").expect("set");
        let first = storage.get("hse.sec.profile").expect("get");
        store.set_item("profile", b"payload").expect("set");
        let second = storage.get("hse.sec.profile").expect("get");
        // Same plaintext, but new salt/IV every write.
        assert_ne!(first, second);
    }

    #[test]
    fn remove_item_deletes() {
        let (_storage, store) = test_store();
        store.set_item("profile", b"payload").expect("set");
        store.remove_item("profile").expect("remove");
        assert_eq!(store.get_item("profile"), None);
    }

    #[test]
    fn clear_sweeps_only_namespaced_keys() {
        let (storage, store) = test_store();
        store.set_item("a", b"1").expect("set");
        store.set_item("b", b"2").expect("set");
        storage.set("hse.session_state", "authenticated").expect("set");

        store.clear().expect("clear");

        assert_eq!(store.get_item("a"), None);
        assert_eq!(store.get_item("b"), None);
        assert_eq!(
            storage.get("hse.session_state").expect("get"),
            Some("authenticated".to_owned())
        );
    }
}
