//! crates/library_core/src/domain.rs
//!
//! Defines the pure, core data structures for the digital library.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type BookId = i64;
pub type MessageId = i64;
pub type UsageEventId = i64;

//=========================================================================================
// Users and Roles
//=========================================================================================

/// Coarse authorization tier carried by every user and every access token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// A user as seen by the rest of the application. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub hashed_password: String,
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
}

/// Administrative profile/role change.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub role: Role,
}

//=========================================================================================
// Books and Assets
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Reference to the uploaded PDF, e.g. `/uploads/files/1700000000000-ab12.pdf`.
    pub file_url: Option<String>,
    /// Reference to the uploaded cover image.
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub file_url: Option<String>,
    pub image_url: Option<String>,
}

/// A partial book update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub image_url: Option<String>,
}

impl BookChanges {
    /// Applies the changes on top of `book`, returning the updated record.
    pub fn apply_to(&self, book: &Book) -> Book {
        Book {
            id: book.id,
            title: self.title.clone().unwrap_or_else(|| book.title.clone()),
            author: self.author.clone().unwrap_or_else(|| book.author.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| book.description.clone()),
            file_url: self.file_url.clone().or_else(|| book.file_url.clone()),
            image_url: self.image_url.clone().or_else(|| book.image_url.clone()),
        }
    }
}

/// The two classes of uploaded asset a book may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Document,
    Image,
}

impl AssetKind {
    /// Maps a book form's upload field onto its asset class. The `file` part is
    /// always a document, whatever content type the client claims.
    pub fn for_form_field(name: &str) -> Option<Self> {
        match name {
            "file" => Some(AssetKind::Document),
            "image" => Some(AssetKind::Image),
            _ => None,
        }
    }

    pub fn directory(&self) -> &'static str {
        match self {
            AssetKind::Document => "files",
            AssetKind::Image => "images",
        }
    }
}

//=========================================================================================
// Usage Ledger
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Read,
    Download,
}

/// A single, immutable read or download of a book by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub id: UsageEventId,
    pub kind: UsageKind,
    pub user_id: UserId,
    pub book_id: BookId,
    pub occurred_at: DateTime<Utc>,
}

/// A usage event joined with the display name of the user at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEntry {
    pub id: UsageEventId,
    pub user_id: UserId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Per-book usage history, each list most-recent-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookUsageReport {
    pub reads: Vec<UsageEntry>,
    pub downloads: Vec<UsageEntry>,
}

/// Global scalar aggregates for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryTotals {
    pub books: i64,
    pub users: i64,
    pub downloads: i64,
    pub reads: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDownloads {
    pub id: BookId,
    pub title: String,
    pub downloads: i64,
}

//=========================================================================================
// Messages
//=========================================================================================

/// User-submitted feedback. Name and email are snapshots taken when it was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub message: String,
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub message: String,
}

/// A message as listed for administrators, with the sender's current name if they still exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageListing {
    pub message: Message,
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" USER ".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn book_changes_only_overwrite_supplied_fields() {
        let book = Book {
            id: 7,
            title: "Old".into(),
            author: "Someone".into(),
            description: "desc".into(),
            file_url: Some("/uploads/files/a.pdf".into()),
            image_url: None,
        };
        let changes = BookChanges {
            title: Some("New".into()),
            image_url: Some("/uploads/images/b.png".into()),
            ..Default::default()
        };

        let updated = changes.apply_to(&book);
        assert_eq!(updated.title, "New");
        assert_eq!(updated.author, "Someone");
        assert_eq!(updated.file_url.as_deref(), Some("/uploads/files/a.pdf"));
        assert_eq!(updated.image_url.as_deref(), Some("/uploads/images/b.png"));
    }

    #[test]
    fn uploads_are_sorted_by_form_field() {
        assert_eq!(AssetKind::for_form_field("file"), Some(AssetKind::Document));
        assert_eq!(AssetKind::for_form_field("image"), Some(AssetKind::Image));
        assert_eq!(AssetKind::for_form_field("title"), None);
        assert_eq!(AssetKind::Document.directory(), "files");
        assert_eq!(AssetKind::Image.directory(), "images");
    }
}
