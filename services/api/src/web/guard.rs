//! services/api/src/web/guard.rs
//!
//! Access guards. `require_auth` establishes who is calling; `require_admin`
//! (layered inside it) restricts a route to administrators.

use crate::auth::Identity;
use crate::error::AppError;
use crate::web::state::AppState;
use axum::{
    extract::{Query, Request, State},
    http::{header, Uri},
    middleware::Next,
    response::Response,
};
use library_core::domain::Role;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Finds the candidate token: `Authorization: Bearer <token>` first, then the
/// `token` query parameter. The query fallback exists for direct navigation
/// (embedded viewers, download links) where headers cannot be set.
pub fn extract_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    from_header.or_else(|| token_from_query(req.uri()))
}

fn token_from_query(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Verifies the caller's token and makes their `Identity` available to handlers.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&req).ok_or(AppError::NoToken)?;
    let claims = state.tokens.verify(&token)?;

    req.extensions_mut().insert(Identity::from(&claims));
    Ok(next.run(req).await)
}

/// Pure role check against the role carried in the token.
pub fn require_role(identity: &Identity, role: Role) -> Result<(), AppError> {
    if identity.role == role {
        return Ok(());
    }
    Err(AppError::Forbidden(match role {
        Role::Admin => "Admins only",
        Role::User => "Insufficient permissions",
    }))
}

/// Must run after `require_auth`. A request without an identity is treated as unauthenticated.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .copied()
        .ok_or(AppError::NoToken)?;
    require_role(&identity, Role::Admin)?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use rstest::rstest;

    fn request(uri: &str, authorization: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn header_token_wins_over_query() {
        let req = request("/books/view/1?token=from-query", Some("Bearer from-header"));
        assert_eq!(extract_token(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn query_token_is_the_fallback() {
        let req = request("/books/view/1?page=2&token=abc.def.ghi", None);
        assert_eq!(extract_token(&req).as_deref(), Some("abc.def.ghi"));

        let not_bearer = request("/books/view/1?token=abc", Some("Basic dXNlcjpwdw=="));
        assert_eq!(extract_token(&not_bearer).as_deref(), Some("abc"));
    }

    #[test]
    fn no_candidate_means_no_token() {
        assert_eq!(extract_token(&request("/books/view/1", None)), None);
        assert_eq!(extract_token(&request("/books/view/1?token=", Some("Bearer "))), None);
    }

    #[rstest]
    #[case(Role::Admin, Role::Admin, true)]
    #[case(Role::User, Role::Admin, false)]
    #[case(Role::Admin, Role::User, false)]
    #[case(Role::User, Role::User, true)]
    fn roles_must_match_exactly(#[case] held: Role, #[case] required: Role, #[case] allowed: bool) {
        let identity = Identity {
            user_id: 1,
            role: held,
        };
        let result = require_role(&identity, required);
        assert_eq!(result.is_ok(), allowed);
        if let Err(err) = result {
            assert!(matches!(err, AppError::Forbidden(_)));
        }
    }

    #[test]
    fn admin_rejection_says_admins_only() {
        let identity = Identity {
            user_id: 1,
            role: Role::User,
        };
        let err = require_role(&identity, Role::Admin).unwrap_err();
        assert_eq!(err.to_string(), "Admins only");
    }
}
