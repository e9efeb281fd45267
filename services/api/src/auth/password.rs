//! services/api/src/auth/password.rs
//!
//! Argon2 password hashing. Hashing is CPU-bound, so both operations run on
//! the blocking pool.

use crate::error::AppError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

/// Hashes a plaintext password into a PHC string.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                AppError::StorageFailure("Failed to hash password".to_string())
            })
    })
    .await
    .map_err(|e| AppError::StorageFailure(format!("hashing task failed: {}", e)))?
}

/// Returns `Ok(false)` on a mismatch; errors only when the stored hash is unreadable.
pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&stored_hash).map_err(|e| {
            error!("Failed to parse password hash: {:?}", e);
            AppError::StorageFailure("Stored password hash is invalid".to_string())
        })?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::StorageFailure(format!("verification task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_verify_only_the_original_password() {
        let hash = hash_password("pw1".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2"));

        assert!(verify_password("pw1".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("pw2".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hashes_are_an_error() {
        let result = verify_password("pw1".to_string(), "not-a-hash".to_string()).await;
        assert!(matches!(result, Err(AppError::StorageFailure(_))));
    }
}
