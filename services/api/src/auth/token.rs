//! services/api/src/auth/token.rs
//!
//! Issues and verifies the signed, time-bounded access tokens (HS256 JWTs).
//! Tokens are stateless: nothing is stored server-side and nothing revokes a
//! token before it expires. The role inside a token is trusted for its whole
//! lifetime, even if the user's role changes in the meantime.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use library_core::domain::{Role, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// The payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: UserId,
    pub role: Role,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// The verified identity attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl From<&Claims> for Identity {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.id,
            role: claims.role,
        }
    }
}

/// Why a token was rejected. Only ever logged; callers see `AppError::TokenInvalid`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Signs a token for `{id, role}`, valid for the configured window from now.
    pub fn issue(&self, id: UserId, role: Role) -> Result<IssuedToken, AppError> {
        self.issue_at(id, role, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        id: UserId,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let iat = issued_at.timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or_else(|| {
                AppError::StorageFailure(format!("token lifetime {:?} is out of range", self.ttl))
            })?;
        let claims = Claims { id, role, iat, exp };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::StorageFailure(format!("failed to sign token: {}", e)))?;

        debug!("Issued token for user {} ({}), expires at {}", id, role, claims.exp);
        Ok(IssuedToken { token, claims })
    }

    /// Verifies signature and expiry. Every failure collapses to `TokenInvalid`.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        self.decode_claims(token).map_err(|cause| {
            debug!("Rejected token: {}", cause);
            AppError::TokenInvalid
        })
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const TWO_HOURS: Duration = Duration::from_secs(2 * 60 * 60);

    fn service() -> TokenService {
        TokenService::new("test-secret-key-12345", TWO_HOURS)
    }

    #[test]
    fn issued_tokens_verify_to_the_same_claims() {
        let tokens = service();
        let issued = tokens.issue(7, Role::Admin).unwrap();

        let claims = tokens.verify(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!((claims.id, claims.role), (7, Role::Admin));
        assert_eq!(claims.exp - claims.iat, 7200);
    }

    #[test]
    fn tokens_expire_after_two_hours() {
        let tokens = service();
        let issued = tokens
            .issue_at(1, Role::User, Utc::now() - ChronoDuration::minutes(121))
            .unwrap();

        assert_eq!(tokens.decode_claims(&issued.token), Err(TokenError::Expired));
        assert!(matches!(tokens.verify(&issued.token), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn tokens_are_valid_just_inside_the_window() {
        let tokens = service();
        let issued = tokens
            .issue_at(1, Role::User, Utc::now() - ChronoDuration::minutes(119))
            .unwrap();
        assert!(tokens.verify(&issued.token).is_ok());
    }

    #[test]
    fn altered_signatures_are_rejected() {
        let tokens = service();
        let issued = tokens.issue(1, Role::User).unwrap();

        let (unsigned, signature) = issued.token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{}.{}{}", unsigned, flipped, &signature[1..]);

        assert_eq!(tokens.decode_claims(&tampered), Err(TokenError::BadSignature));
        assert!(matches!(tokens.verify(&tampered), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let other = TokenService::new("another-secret", TWO_HOURS);
        let issued = other.issue(1, Role::Admin).unwrap();

        assert_eq!(service().decode_claims(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(service().decode_claims("invalid.token.here"), Err(TokenError::Malformed));
        assert!(matches!(service().verify(""), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn out_of_range_lifetimes_fail_instead_of_wrapping() {
        let tokens = TokenService::new("test-secret-key-12345", Duration::from_secs(u64::MAX));
        assert!(matches!(
            tokens.issue(1, Role::User),
            Err(AppError::StorageFailure(_))
        ));

        let near_limit = TokenService::new("test-secret-key-12345", Duration::from_secs(i64::MAX as u64));
        assert!(near_limit.issue(1, Role::User).is_err());
    }
}
