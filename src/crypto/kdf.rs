use argon2::{Algorithm, Argon2, Params, Version};
use getrandom::fill;
use zeroize::Zeroizing;

use super::{KEY_LEN, NONCE_LEN, SALT_LEN};
use crate::error::CryptoError;

/// Argon2id cost parameters.
///
/// The derived key length is not a knob: both supported ciphers take a
/// 256-bit key, so it is fixed at [`KEY_LEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostParams {
    iterations: u32,
    memory_mb: u32,
    threads: u8,
}

impl CostParams {
    /// High-cost parameters for at-rest protection.
    pub fn strong() -> Self {
        Self {
            iterations: 100_000,
            memory_mb: 64,
            threads: 4,
        }
    }

    /// Low-cost parameters for development and testing.
    pub fn fast() -> Self {
        Self {
            iterations: 1_000,
            memory_mb: 8,
            threads: 1,
        }
    }

    pub fn new(iterations: u32, memory_mb: u32, threads: u8) -> Result<Self, CryptoError> {
        let params = Self {
            iterations,
            memory_mb,
            threads,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Memory cost in MB.
    pub fn memory_mb(&self) -> u32 {
        self.memory_mb
    }

    pub fn threads(&self) -> u8 {
        self.threads
    }

    fn memory_kib(&self) -> u32 {
        self.memory_mb * 1024
    }

    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.iterations < 1 {
            return Err(CryptoError::InvalidParams(
                "iteration count must be >= 1".into(),
            ));
        }
        if self.threads < 1 {
            return Err(CryptoError::InvalidParams("threads must be >= 1".into()));
        }
        if self.memory_kib() < 8 * u32::from(self.threads) {
            return Err(CryptoError::InvalidParams(
                "memory cost must be at least 8 KiB per thread".into(),
            ));
        }
        Ok(())
    }
}

/// Derive a 256-bit key from a passphrase with Argon2id.
///
/// Deterministic: identical inputs always produce the identical key. The
/// returned buffer zeroes itself on drop.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: CostParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    params.validate()?;

    let argon_params = Params::new(
        params.memory_kib(),
        params.iterations(),
        u32::from(params.threads()),
        Some(KEY_LEN),
    )
    .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, salt, key.as_mut())
        .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;

    Ok(key)
}

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    fill(buf).map_err(|_| CryptoError::RandomUnavailable)
}

/// Generate a fresh 32-byte salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate a fresh 12-byte nonce.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    Ok(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroize;

    fn cheap() -> CostParams {
        CostParams::new(1, 8, 1).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = [42u8; SALT_LEN];

        let k1 = derive_key(b"passphrase", &salt, cheap()).unwrap();
        let k2 = derive_key(b"passphrase", &salt, cheap()).unwrap();

        assert_eq!(*k1, *k2);
    }

    #[test]
    fn salt_affects_output() {
        let k1 = derive_key(b"pw", &[7u8; SALT_LEN], cheap()).unwrap();
        let k2 = derive_key(b"pw", &[8u8; SALT_LEN], cheap()).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn cost_params_affect_output() {
        let salt = [7u8; SALT_LEN];

        let k1 = derive_key(b"pw", &salt, CostParams::new(1, 8, 1).unwrap()).unwrap();
        let k2 = derive_key(b"pw", &salt, CostParams::new(2, 8, 1).unwrap()).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn presets_use_fixed_values() {
        let strong = CostParams::strong();
        assert_eq!(strong.iterations(), 100_000);
        assert_eq!(strong.memory_mb(), 64);
        assert_eq!(strong.threads(), 4);

        let fast = CostParams::fast();
        assert_eq!(fast.iterations(), 1_000);
        assert_eq!(fast.memory_mb(), 8);
        assert_eq!(fast.threads(), 1);
    }

    #[test]
    fn invalid_params_fail_gracefully() {
        assert!(CostParams::new(0, 8, 1).is_err());
        assert!(CostParams::new(1, 0, 1).is_err());
        assert!(CostParams::new(1, 8, 0).is_err());
    }

    #[test]
    fn generated_salts_differ() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();

        assert_eq!(a.len(), SALT_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn generated_nonces_differ() {
        let a = generate_nonce().unwrap();
        let b = generate_nonce().unwrap();

        assert_eq!(a.len(), NONCE_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn key_buffer_zeroizes() {
        let mut key = *derive_key(b"pw", &[1u8; SALT_LEN], cheap()).unwrap();
        assert_ne!(key, [0u8; KEY_LEN]);

        key.zeroize();
        assert_eq!(key, [0u8; KEY_LEN]);
    }
}
