//! services/api/src/auth/credentials.rs
//!
//! Registration and login on top of the credential store. Login is where
//! access tokens are issued.

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{IssuedToken, TokenService};
use crate::error::AppError;
use library_core::domain::{NewUser, Role, User};
use library_core::ports::{DatabaseService, PortError};
use std::sync::Arc;
use tracing::{info, warn};

/// A registration request after transport decoding.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Clone)]
pub struct CredentialService {
    db: Arc<dyn DatabaseService>,
    tokens: Arc<TokenService>,
}

impl CredentialService {
    pub fn new(db: Arc<dyn DatabaseService>, tokens: Arc<TokenService>) -> Self {
        Self { db, tokens }
    }

    /// Creates a user. A second registration for the same email fails with
    /// `DuplicateResource`, whether it loses a race or arrives later.
    pub async fn register(&self, registration: Registration) -> Result<User, AppError> {
        let name = registration.name.trim().to_string();
        let email = registration.email.trim().to_string();
        if name.is_empty() || email.is_empty() || registration.password.is_empty() {
            return Err(AppError::Validation(
                "Name, email and password are required".to_string(),
            ));
        }

        let hashed_password = hash_password(registration.password).await?;
        let user = self
            .db
            .create_user(NewUser {
                name,
                email,
                hashed_password,
                role: registration.role.unwrap_or_default(),
            })
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => AppError::DuplicateResource("User already exists".to_string()),
                other => other.into(),
            })?;

        info!("Registered user {} ({})", user.id, user.role);
        Ok(user)
    }

    /// Checks the email/password pair and issues a token for `{id, role}`.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AppError> {
        let credentials = self
            .db
            .get_user_by_email(email.trim())
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => {
                    warn!("Login attempt for unknown email");
                    AppError::UserNotFound
                }
                other => other.into(),
            })?;

        if !verify_password(password.to_string(), credentials.hashed_password).await? {
            warn!("Failed login attempt for user {}", credentials.id);
            return Err(AppError::InvalidCredentials);
        }

        let issued = self.tokens.issue(credentials.id, credentials.role)?;
        info!("Login successful for user {} ({})", credentials.id, credentials.role);
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryDb;
    use std::time::Duration;

    fn service() -> (CredentialService, Arc<TokenService>) {
        let tokens = Arc::new(TokenService::new("secret", Duration::from_secs(7200)));
        let db: Arc<dyn DatabaseService> = Arc::new(InMemoryDb::new());
        (CredentialService::new(db, tokens.clone()), tokens)
    }

    fn registration(email: &str, role: Option<Role>) -> Registration {
        Registration {
            name: "Ada".to_string(),
            email: email.to_string(),
            password: "pw1".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn login_issues_token_with_registered_identity() {
        let (credentials, tokens) = service();
        let user = credentials
            .register(registration("a@x.com", Some(Role::Admin)))
            .await
            .unwrap();

        let issued = credentials.login("a@x.com", "pw1").await.unwrap();
        let claims = tokens.verify(&issued.token).unwrap();
        assert_eq!((claims.id, claims.role), (user.id, Role::Admin));
    }

    #[tokio::test]
    async fn role_defaults_to_user() {
        let (credentials, _) = service();
        let user = credentials.register(registration("a@x.com", None)).await.unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn second_registration_with_same_email_is_a_duplicate() {
        let (credentials, _) = service();
        credentials.register(registration("a@x.com", None)).await.unwrap();

        let err = credentials
            .register(registration("a@x.com", Some(Role::Admin)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateResource(_)));

        // The original account still logs in with its own role.
        let issued = credentials.login("a@x.com", "pw1").await.unwrap();
        assert_eq!(issued.claims.role, Role::User);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_distinct() {
        let (credentials, _) = service();
        credentials.register(registration("a@x.com", None)).await.unwrap();

        assert!(matches!(
            credentials.login("b@x.com", "pw1").await,
            Err(AppError::UserNotFound)
        ));
        assert!(matches!(
            credentials.login("a@x.com", "wrong").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let (credentials, _) = service();
        let mut blank = registration("  ", None);
        blank.password = String::new();

        assert!(matches!(
            credentials.register(blank).await,
            Err(AppError::Validation(_))
        ));
    }
}
