//! Password hashing for stored credentials.
//!
//! Uses Argon2id in PHC string format, so every stored hash carries its own
//! salt and cost parameters and stays verifiable after the configured cost
//! changes.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use larder_config::PasswordHashConfig;
use rand::RngCore;

use crate::error::{Error, Result};

/// Length of the random salt mixed into each hash.
const SALT_LEN: usize = 16;

/// Argon2id hasher with configurable cost.
#[derive(Debug, Clone, Default)]
pub struct PasswordHashing {
    params: Params,
}

impl PasswordHashing {
    /// Hasher with explicit cost: memory in KiB, passes and lanes.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(Self { params })
    }

    /// Hasher with the configured cost.
    pub fn from_config(config: &PasswordHashConfig) -> Result<Self> {
        Self::with_params(config.memory_kib, config.iterations, config.parallelism)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(|e| Error::PasswordHash(e.to_string()))?;

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash.
    ///
    /// Returns `false` for malformed hashes as well as for wrong passwords.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHashing {
        PasswordHashing::with_params(64, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hashing = fast();
        let hash = hashing.hash("secret").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("secret"));
        assert!(hashing.verify("secret", &hash));
        assert!(!hashing.verify("wrong", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hashing = fast();
        assert_ne!(hashing.hash("secret").unwrap(), hashing.hash("secret").unwrap());
    }

    #[test]
    fn test_verify_uses_stored_params() {
        let hash = fast().hash("secret").unwrap();
        let other = PasswordHashing::with_params(128, 2, 1).unwrap();
        assert!(other.verify("secret", &hash));
    }

    #[test]
    fn test_malformed_hash_is_rejected() {
        assert!(!fast().verify("secret", "not a hash"));
        assert!(!fast().verify("secret", ""));
    }

    #[test]
    fn test_default_uses_argon2_defaults() {
        let hash = PasswordHashing::default().hash("secret").unwrap();
        let expected = format!(
            "$argon2id$v=19$m={},t={},p={}$",
            Params::DEFAULT_M_COST,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST
        );
        assert!(hash.starts_with(&expected), "{hash}");
    }

    #[test]
    fn test_invalid_params() {
        let result = PasswordHashing::with_params(1, 1, 1);
        assert!(matches!(result, Err(Error::PasswordHash(_))));
    }
}
