//! Password hashing.
//!
//! Passwords are stored as Argon2id PHC strings with a random per-password salt.

use anyhow::Result;
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash,
    PasswordHasher as _, PasswordVerifier as _, Version,
};
use rand::rngs::OsRng;

pub trait PasswordHasher: Send + Sync {
    /// Produce a one-way digest of `plaintext`.
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Check `plaintext` against a digest produced by [`PasswordHasher::hash`].
    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

#[derive(Clone, Debug)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Argon2id with the crate's default cost parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Custom cost parameters (memory in KiB, iterations, lanes).
    ///
    /// # Errors
    ///
    /// Returns an error if argon2 rejects the parameters.
    pub fn with_cost(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|err| anyhow::anyhow!("invalid Argon2 parameters: {err}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|err| anyhow::anyhow!("failed to hash password: {err}"))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        // Malformed digests never verify.
        PasswordHash::new(digest).is_ok_and(|parsed| {
            self.argon2()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
        })
    }
}
