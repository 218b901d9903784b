use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::{error, instrument};

use crate::error::{Result, ServiceError};

/// Hashes a plaintext password into an Argon2id PHC string with a fresh salt.
#[instrument(skip_all)]
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ServiceError::Internal(format!("password hashing failed: {e}"))
        })
}

/// Checks `plain` against a stored PHC string.
///
/// A mismatch is `Ok(false)`; only an unparsable stored hash is an error.
#[instrument(skip_all)]
pub fn verify_password(hash: &str, plain: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!("Stored password hash is malformed: {}", e);
        ServiceError::Internal(format!("malformed password hash: {e}"))
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "s3cret-pass").unwrap());
        assert!(!verify_password(&hash, "wrong").unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("not-a-phc-string", "x").is_err());
    }
}
