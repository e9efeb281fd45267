//! services/api/src/web/auth.rs
//!
//! Registration, login and user administration endpoints.

use crate::auth::Registration;
use crate::error::AppError;
use crate::web::extract::{IdPath, JsonBody};
use crate::web::state::AppState;
use axum::{extract::State, Json};
use library_core::domain::{Role, User, UserId, UserUpdate};
use library_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// `user` (default) or `admin`.
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    #[schema(value_type = String)]
    pub role: Role,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    #[schema(value_type = String)]
    pub role: Role,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[schema(value_type = String)]
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

fn user_not_found(err: PortError) -> AppError {
    match err {
        PortError::NotFound(_) => AppError::NotFound("User not found".to_string()),
        PortError::Conflict(_) => AppError::DuplicateResource("Email already in use".to_string()),
        other => other.into(),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = MessageResponse),
        (status = 400, description = "Missing fields or duplicate email", body = MessageResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .credentials
        .register(Registration {
            name: req.name,
            email: req.email,
            password: req.password,
            role: req.role,
        })
        .await?;

    Ok(MessageResponse::new("User registered successfully"))
}

/// POST /auth/login - Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "User not found", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let issued = state.credentials.login(&req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        role: issued.claims.role,
        expires_in: issued.claims.exp - issued.claims.iat,
        token: issued.token,
    }))
}

/// GET /auth/ - List all users
#[utoipa::path(
    get,
    path = "/auth/",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 401, description = "Missing or invalid token", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.db.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// PUT /auth/{id} - Update a user's profile and role
#[utoipa::path(
    put,
    path = "/auth/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = MessageResponse),
        (status = 400, description = "Invalid fields or duplicate email", body = MessageResponse),
        (status = 404, description = "No such user", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    IdPath(user_id): IdPath<UserId>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let update = UserUpdate {
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        role: req.role,
    };
    if update.name.is_empty() || update.email.is_empty() {
        return Err(AppError::Validation("Name and email are required".to_string()));
    }

    state
        .db
        .update_user(user_id, &update)
        .await
        .map_err(user_not_found)?;

    info!("User {} updated (role {})", user_id, update.role);
    Ok(MessageResponse::new("User updated successfully"))
}

/// DELETE /auth/{id} - Delete a user
#[utoipa::path(
    delete,
    path = "/auth/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, description = "No such user", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    IdPath(user_id): IdPath<UserId>,
) -> Result<Json<MessageResponse>, AppError> {
    state.db.delete_user(user_id).await.map_err(user_not_found)?;

    info!("User {} deleted", user_id);
    Ok(MessageResponse::new("User deleted successfully"))
}
