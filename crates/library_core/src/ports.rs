//! crates/library_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the library's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete database engine and file storage.

use crate::domain::{
    AssetKind, Book, BookChanges, BookDownloads, BookId, LibraryTotals, Message, MessageId,
    MessageListing, NewBook, NewMessage, NewUser, UsageEvent, UsageEventId, UsageKind, User,
    UserCredentials, UserId, UserUpdate,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The backing service could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Credential Store ---
    /// Fails with `PortError::Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: UserId) -> PortResult<User>;

    async fn list_users(&self) -> PortResult<Vec<User>>;

    async fn update_user(&self, user_id: UserId, update: &UserUpdate) -> PortResult<()>;

    async fn delete_user(&self, user_id: UserId) -> PortResult<()>;

    /// Display names for the given ids. Unknown ids are simply absent from the map.
    async fn user_names(&self, user_ids: &[UserId]) -> PortResult<HashMap<UserId, String>>;

    // --- Book Catalogue ---
    async fn list_books(&self) -> PortResult<Vec<Book>>;

    async fn get_book(&self, book_id: BookId) -> PortResult<Book>;

    async fn create_book(&self, book: NewBook) -> PortResult<Book>;

    async fn update_book(&self, book_id: BookId, changes: &BookChanges) -> PortResult<Book>;

    /// Removes the book and returns the deleted record so its assets can be cleaned up.
    async fn delete_book(&self, book_id: BookId) -> PortResult<Book>;

    // --- Usage Ledger ---
    async fn record_usage(
        &self,
        kind: UsageKind,
        user_id: UserId,
        book_id: BookId,
    ) -> PortResult<UsageEventId>;

    /// Events of one kind for one book, most recent first.
    async fn usage_for_book(&self, kind: UsageKind, book_id: BookId) -> PortResult<Vec<UsageEvent>>;

    /// All events of one kind, most recent first.
    async fn list_usage(&self, kind: UsageKind) -> PortResult<Vec<UsageEvent>>;

    async fn totals(&self) -> PortResult<LibraryTotals>;

    /// Every book with its download count, including books never downloaded.
    async fn downloads_per_book(&self) -> PortResult<Vec<BookDownloads>>;

    // --- Messages ---
    async fn create_message(&self, message: NewMessage) -> PortResult<Message>;

    async fn list_messages(&self) -> PortResult<Vec<MessageListing>>;

    async fn list_messages_for_user(&self, user_id: UserId) -> PortResult<Vec<Message>>;

    async fn reply_to_message(&self, message_id: MessageId, reply: &str) -> PortResult<()>;

    async fn delete_message(&self, message_id: MessageId) -> PortResult<()>;
}

/// Storage for uploaded binary assets, addressed by the reference strings kept on books.
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Persists an upload and returns the reference to store on the book.
    async fn store(&self, kind: AssetKind, original_name: &str, data: Bytes) -> PortResult<String>;

    /// Resolves a reference to a readable file, or `None` when nothing exists there.
    async fn locate(&self, reference: &str) -> PortResult<Option<PathBuf>>;

    /// Removes the file behind a reference. Removing a missing file is not an error.
    async fn remove(&self, reference: &str) -> PortResult<()>;
}
