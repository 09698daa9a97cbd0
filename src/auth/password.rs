//! Argon2 password hashing. Both operations are CPU bound and run on the
//! blocking pool.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::{AppError, Result};

pub async fn hash(password: &str) -> Result<String> {
    let password = password.to_owned();

    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

/// `Ok(false)` on a mismatch; an unparseable stored hash is an error.
pub async fn verify(password: &str, stored: &str) -> Result<bool> {
    let password = password.to_owned();
    let stored = stored.to_owned();

    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_verifies_only_the_original_password() {
        let stored = hash("correct horse").await.unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(verify("correct horse", &stored).await.unwrap());
        assert!(!verify("battery staple", &stored).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_an_error() {
        assert!(verify("anything", "not-a-hash").await.is_err());
    }
}
