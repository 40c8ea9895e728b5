use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use tracing::error;

use crate::validator::Validator;

/// Hashes a plaintext password with a fresh random salt. The plaintext only
/// ever lives on the stack of the in-flight request; it is never persisted
/// or logged.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?;
    Ok(hash.to_string())
}

/// Verifies a candidate plaintext against a stored hash. A mismatch is a
/// normal `Ok(false)` outcome; any other failure (unparseable hash, foreign
/// algorithm, bad params) is an error rather than a silent rejection.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, "argon2 verify error");
            Err(anyhow::anyhow!(e.to_string()))
        }
    }
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= 8,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= 72,
        "password",
        "must not be more than 72 bytes long",
    );
}
