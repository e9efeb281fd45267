//! services/api/src/web/messages.rs
//!
//! User feedback messages and administrator replies.

use crate::auth::Identity;
use crate::error::AppError;
use crate::web::auth::MessageResponse;
use crate::web::extract::{IdPath, JsonBody};
use crate::web::state::AppState;
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use library_core::domain::{Message, MessageId, MessageListing, NewMessage, UserId};
use library_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

const UNKNOWN_SENDER: &str = "Unknown";
const UNKNOWN_EMAIL: &str = "unknown@example.com";

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub message: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReplyRequest {
    pub reply: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageView {
    pub id: MessageId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub message: String,
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    /// The sender's current name; only present in the administrator listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            user_id: message.user_id,
            name: message.name,
            email: message.email,
            message: message.message,
            reply: message.reply,
            created_at: message.created_at,
            username: None,
        }
    }
}

impl From<MessageListing> for MessageView {
    fn from(listing: MessageListing) -> Self {
        Self {
            username: listing.username,
            ..listing.message.into()
        }
    }
}

fn required(value: Option<String>, what: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", what)))
}

fn message_not_found(err: PortError) -> AppError {
    match err {
        PortError::NotFound(_) => AppError::NotFound("Message not found".to_string()),
        other => other.into(),
    }
}

/// POST /messages - Send feedback to the administrators
#[utoipa::path(
    post,
    path = "/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Empty message", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let text = required(req.message, "Message")?;

    // The sender may have been deleted since the token was issued.
    let (name, email) = match state.db.get_user_by_id(identity.user_id).await {
        Ok(user) => (user.name, user.email),
        Err(PortError::NotFound(_)) => (UNKNOWN_SENDER.to_string(), UNKNOWN_EMAIL.to_string()),
        Err(other) => return Err(other.into()),
    };

    let message = state
        .db
        .create_message(NewMessage {
            user_id: identity.user_id,
            name,
            email,
            message: text,
        })
        .await?;

    info!("User {} sent message {}", identity.user_id, message.id);
    Ok(MessageResponse::new("Message sent successfully"))
}

/// GET /messages - All messages, newest first
#[utoipa::path(
    get,
    path = "/messages",
    responses(
        (status = 200, description = "All messages", body = [MessageView]),
        (status = 403, description = "Admins only", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    let listings = state.db.list_messages().await?;
    Ok(Json(listings.into_iter().map(Into::into).collect()))
}

/// GET /messages/user - The caller's own messages
#[utoipa::path(
    get,
    path = "/messages/user",
    responses((status = 200, description = "The caller's messages", body = [MessageView])),
    security(("bearer_auth" = []))
)]
pub async fn my_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    let messages = state.db.list_messages_for_user(identity.user_id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// PUT /messages/{id}/reply - Answer a message
#[utoipa::path(
    put,
    path = "/messages/{id}/reply",
    params(("id" = i64, Path, description = "Message id")),
    request_body = ReplyRequest,
    responses(
        (status = 200, description = "Reply saved", body = MessageResponse),
        (status = 400, description = "Empty reply", body = MessageResponse),
        (status = 404, description = "No such message", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn reply_handler(
    State(state): State<Arc<AppState>>,
    IdPath(message_id): IdPath<MessageId>,
    JsonBody(req): JsonBody<ReplyRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let reply = required(req.reply, "Reply")?;
    state
        .db
        .reply_to_message(message_id, &reply)
        .await
        .map_err(message_not_found)?;

    Ok(MessageResponse::new("Reply saved"))
}

/// DELETE /messages/{id} - Remove a message
#[utoipa::path(
    delete,
    path = "/messages/{id}",
    params(("id" = i64, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message deleted", body = MessageResponse),
        (status = 404, description = "No such message", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_message_handler(
    State(state): State<Arc<AppState>>,
    IdPath(message_id): IdPath<MessageId>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .db
        .delete_message(message_id)
        .await
        .map_err(message_not_found)?;

    Ok(MessageResponse::new("Message deleted successfully"))
}
