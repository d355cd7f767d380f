//! Credential material: password hashing and opaque value generation.
//!
//! Passwords use Argon2id. Codes, tokens and application secrets are 32 random
//! bytes from the OS CSPRNG, URL-safe base64 encoded (43 characters).

use crate::error::PersistenceError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;

/// Hash a password using Argon2id, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String, PersistenceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PersistenceError::Credential(e.to_string()))
}

/// Verify a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Source of opaque code and token values.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Generator backed by the operating system's CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsTokenGenerator;

impl TokenGenerator for OsTokenGenerator {
    fn generate(&self) -> String {
        let mut bytes = [0u8; 32];
        // An unusable OS entropy source leaves nothing safe to fall back to.
        getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}
