//! services/api/src/auth/mod.rs
//!
//! Credential verification and access-token issuance.

pub mod credentials;
pub mod password;
pub mod token;

pub use credentials::{CredentialService, Registration};
pub use token::{Claims, Identity, IssuedToken, TokenService};
