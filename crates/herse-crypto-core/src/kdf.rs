//! scrypt key derivation with environment-profile presets.
//!
//! This module provides:
//! - [`derive`] — derive a 256-bit key from a master secret + salt using scrypt
//! - [`ScryptParams`] — serializable parameter set (travels with each record)
//! - [`KdfPreset`] — Interactive / Hardened preset selector
//!
//! scrypt is deliberately slow and memory-hard: if a serialized record is
//! exfiltrated, brute-forcing a weak master secret still costs real time
//! per guess.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Output length of the KDF in bytes (256 bits).
const OUTPUT_LEN: usize = 32;

/// Minimum salt length in bytes.
const MIN_SALT_LEN: usize = 16;

/// Minimum accepted log2 cost. `scrypt::Params` itself accepts `log_n = 0`
/// (N = 1), which has no memory-hardness at all; anything below this floor
/// is rejected before derivation.
const MIN_LOG_N: u8 = 4;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// scrypt parameter set.
///
/// Fields use the `scrypt` crate convention:
/// - `log_n`: log2 of the CPU/memory cost (N = 2^log_n blocks)
/// - `r`: block size factor (memory per block = 128 * r bytes)
/// - `p`: degree of parallelism
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScryptParams {
    /// log2 of the cost parameter N. 15 → 32 MiB working set with r = 8.
    pub log_n: u8,
    /// Block size factor.
    pub r: u32,
    /// Degree of parallelism.
    pub p: u32,
}

/// KDF preset selector, one per security profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfPreset {
    /// Development profile — fast enough for an edit/run loop (~100ms).
    Interactive,
    /// Hardened profile — maximum brute-force resistance (~1s).
    Hardened,
}

impl KdfPreset {
    /// Return the parameters for this preset.
    #[must_use]
    pub const fn params(self) -> ScryptParams {
        match self {
            Self::Interactive => ScryptParams {
                log_n: 15,
                r: 8,
                p: 1,
            },
            Self::Hardened => ScryptParams {
                log_n: 17,
                r: 8,
                p: 1,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Derive a 256-bit key from a master secret and salt using scrypt.
///
/// Returns a [`SecretBuffer`] containing 32 bytes. The intermediate buffer
/// is zeroized after copying into the `SecretBuffer`.
///
/// The master secret may be any length, including empty — secret strength
/// validation belongs to the caller (policy layer), not here.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if:
/// - The salt is shorter than 16 bytes
/// - The cost is below the memory-hardness floor (`log_n < 4`), or `r`/`p`
///   is zero
/// - The scrypt parameters are otherwise invalid
pub fn derive(
    secret: &[u8],
    salt: &[u8],
    params: &ScryptParams,
) -> Result<SecretBuffer, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }

    if params.log_n < MIN_LOG_N {
        return Err(CryptoError::KeyDerivation(format!(
            "cost too low: log_n {} (minimum {MIN_LOG_N})",
            params.log_n
        )));
    }
    if params.r == 0 || params.p == 0 {
        return Err(CryptoError::KeyDerivation(
            "r and p must be non-zero".into(),
        ));
    }

    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, OUTPUT_LEN)
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid scrypt params: {e}")))?;

    let mut output = [0u8; OUTPUT_LEN];
    scrypt::scrypt(secret, salt, &scrypt_params, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(format!("scrypt derivation failed: {e}")))?;

    let result = SecretBuffer::new(&output);
    output.zeroize();
    Ok(result)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Small params for fast tests — 4 KiB working set.
    const TEST_PARAMS: ScryptParams = ScryptParams {
        log_n: 5,
        r: 8,
        p: 1,
    };

    const TEST_SALT: &[u8; 16] = b"0123456789abcdef";

    #[test]
    fn derive_produces_32_byte_output() {
        let key = derive(b"master", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive(b"master", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        let b = derive(b"master", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn derive_different_salts_produce_different_keys() {
        let a = derive(b"master", b"salt_aaaaaaaaaaaaa", &TEST_PARAMS)
            .expect("derive should succeed");
        let b = derive(b"master", b"salt_bbbbbbbbbbbbb", &TEST_PARAMS)
            .expect("derive should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn derive_different_secrets_produce_different_keys() {
        let a = derive(b"master_a", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        let b = derive(b"master_b", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn derive_rejects_short_salt() {
        let err =
            derive(b"master", b"short", &TEST_PARAMS).expect_err("derive should reject short salt");
        let msg = format!("{err}");
        assert!(msg.contains("salt too short"));
    }

    #[test]
    fn derive_rejects_invalid_params() {
        let bad = ScryptParams {
            log_n: 0,
            r: 8,
            p: 1,
        };
        let result = derive(b"master", TEST_SALT, &bad);
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
    }

    #[test]
    fn derive_rejects_cost_below_floor() {
        // log_n 3 → N = 8, well under the memory-hardness floor.
        let bad = ScryptParams {
            log_n: 3,
            r: 8,
            p: 1,
        };
        let err = derive(b"master", TEST_SALT, &bad).expect_err("cost floor");
        let msg = format!("{err}");
        assert!(msg.contains("cost too low"));

        // The floor itself derives.
        let floor = ScryptParams {
            log_n: 4,
            r: 8,
            p: 1,
        };
        assert!(derive(b"master", TEST_SALT, &floor).is_ok());
    }

    #[test]
    fn derive_rejects_zero_r_and_zero_p() {
        for bad in [
            ScryptParams {
                log_n: 5,
                r: 0,
                p: 1,
            },
            ScryptParams {
                log_n: 5,
                r: 8,
                p: 0,
            },
        ] {
            let result = derive(b"master", TEST_SALT, &bad);
            assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
        }
    }

    #[test]
    fn derive_output_is_secret_buffer() {
        let key = derive(b"master", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        let debug = format!("{key:?}");
        assert_eq!(debug, "SecretBuffer(***)");
    }

    #[test]
    fn preset_params_interactive() {
        let p = KdfPreset::Interactive.params();
        assert_eq!(p.log_n, 15);
        assert_eq!(p.r, 8);
        assert_eq!(p.p, 1);
    }

    #[test]
    fn preset_params_hardened_is_stricter() {
        let hardened = KdfPreset::Hardened.params();
        let interactive = KdfPreset::Interactive.params();
        assert!(hardened.log_n > interactive.log_n);
    }

    #[test]
    fn scrypt_params_serde_roundtrip() {
        let params = ScryptParams {
            log_n: 15,
            r: 8,
            p: 1,
        };
        let json = serde_json::to_string(&params).expect("serialize should succeed");
        let deserialized: ScryptParams =
            serde_json::from_str(&json).expect("deserialize should succeed");
        assert_eq!(params, deserialized);
    }

    #[test]
    fn kdf_preset_serde_roundtrip() {
        for preset in [KdfPreset::Interactive, KdfPreset::Hardened] {
            let json = serde_json::to_string(&preset).expect("serialize should succeed");
            let deserialized: KdfPreset =
                serde_json::from_str(&json).expect("deserialize should succeed");
            assert_eq!(preset, deserialized);
        }
    }
}
