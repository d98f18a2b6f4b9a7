//! Password hashing using Argon2id
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...`), so the parameters
//! travel with the hash and verification needs no extra context.
//!
//! ```rust
//! use tourbook::auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::default();
//! let hash = hasher.hash("pass1234").unwrap();
//! assert!(hasher.verify("pass1234", &hash).unwrap());
//! assert!(!hasher.verify("pass12345", &hash).unwrap());
//! ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::error::{Error, Result};

/// Argon2id password hasher
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Hasher with explicit cost parameters
    pub fn with_params(memory_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_cost_kib, time_cost, parallelism, None)
            .map_err(|e| Error::Password(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Password(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Check a candidate password against a stored hash
    ///
    /// A mismatch is `Ok(false)`; only a malformed hash is an error.
    pub fn verify(&self, candidate: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| Error::Password(format!("Invalid password hash format: {}", e)))?;

        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Password(format!("Password verification failed: {}", e))),
        }
    }
}
