//! services/api/src/adapters/memory.rs
//!
//! An in-memory `DatabaseService` used by tests in place of PostgreSQL. It
//! mirrors the constraints the real schema enforces: unique emails and
//! cascading deletion of usage events with their book.

use async_trait::async_trait;
use chrono::Utc;
use library_core::domain::{
    Book, BookChanges, BookDownloads, BookId, LibraryTotals, Message, MessageId, MessageListing,
    NewBook, NewMessage, NewUser, UsageEvent, UsageEventId, UsageKind, User, UserCredentials,
    UserId, UserUpdate,
};
use library_core::ports::{DatabaseService, PortError, PortResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentialsRow>,
    books: Vec<Book>,
    events: Vec<UsageEvent>,
    messages: Vec<Message>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone)]
struct UserCredentialsRow {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unavailable("in-memory store poisoned".to_string()))
    }
}

fn newest_first(mut events: Vec<UsageEvent>) -> Vec<UsageEvent> {
    events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
    events
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let mut tables = self.lock()?;
        if tables.users.iter().any(|row| row.user.email == user.email) {
            return Err(PortError::Conflict("User already exists".to_string()));
        }

        let created = User {
            id: tables.next_id(),
            name: user.name,
            email: user.email,
            role: user.role,
        };
        tables.users.push(UserCredentialsRow {
            user: created.clone(),
            hashed_password: user.hashed_password,
        });
        Ok(created)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.lock()?
            .users
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| UserCredentials {
                id: row.user.id,
                email: row.user.email.clone(),
                role: row.user.role,
                hashed_password: row.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }

    async fn get_user_by_id(&self, user_id: UserId) -> PortResult<User> {
        self.lock()?
            .users
            .iter()
            .find(|row| row.user.id == user_id)
            .map(|row| row.user.clone())
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        Ok(self.lock()?.users.iter().map(|row| row.user.clone()).collect())
    }

    async fn update_user(&self, user_id: UserId, update: &UserUpdate) -> PortResult<()> {
        let mut tables = self.lock()?;
        if tables
            .users
            .iter()
            .any(|row| row.user.id != user_id && row.user.email == update.email)
        {
            return Err(PortError::Conflict("Email already in use".to_string()));
        }

        let row = tables
            .users
            .iter_mut()
            .find(|row| row.user.id == user_id)
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))?;
        row.user.name = update.name.clone();
        row.user.email = update.email.clone();
        row.user.role = update.role;
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> PortResult<()> {
        let mut tables = self.lock()?;
        let before = tables.users.len();
        tables.users.retain(|row| row.user.id != user_id);
        if tables.users.len() == before {
            return Err(PortError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn user_names(&self, user_ids: &[UserId]) -> PortResult<HashMap<UserId, String>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .filter(|row| user_ids.contains(&row.user.id))
            .map(|row| (row.user.id, row.user.name.clone()))
            .collect())
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        Ok(self.lock()?.books.clone())
    }

    async fn get_book(&self, book_id: BookId) -> PortResult<Book> {
        self.lock()?
            .books
            .iter()
            .find(|b| b.id == book_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Book not found".to_string()))
    }

    async fn create_book(&self, book: NewBook) -> PortResult<Book> {
        let mut tables = self.lock()?;
        let created = Book {
            id: tables.next_id(),
            title: book.title,
            author: book.author,
            description: book.description,
            file_url: book.file_url,
            image_url: book.image_url,
        };
        tables.books.push(created.clone());
        Ok(created)
    }

    async fn update_book(&self, book_id: BookId, changes: &BookChanges) -> PortResult<Book> {
        let mut tables = self.lock()?;
        let book = tables
            .books
            .iter_mut()
            .find(|b| b.id == book_id)
            .ok_or_else(|| PortError::NotFound("Book not found".to_string()))?;
        *book = changes.apply_to(book);
        Ok(book.clone())
    }

    async fn delete_book(&self, book_id: BookId) -> PortResult<Book> {
        let mut tables = self.lock()?;
        let position = tables
            .books
            .iter()
            .position(|b| b.id == book_id)
            .ok_or_else(|| PortError::NotFound("Book not found".to_string()))?;
        let removed = tables.books.remove(position);
        tables.events.retain(|e| e.book_id != book_id);
        Ok(removed)
    }

    async fn record_usage(
        &self,
        kind: UsageKind,
        user_id: UserId,
        book_id: BookId,
    ) -> PortResult<UsageEventId> {
        let mut tables = self.lock()?;
        if !tables.books.iter().any(|b| b.id == book_id) {
            return Err(PortError::Unexpected(format!(
                "book {} does not exist",
                book_id
            )));
        }

        let id = tables.next_id();
        tables.events.push(UsageEvent {
            id,
            kind,
            user_id,
            book_id,
            occurred_at: Utc::now(),
        });
        Ok(id)
    }

    async fn usage_for_book(&self, kind: UsageKind, book_id: BookId) -> PortResult<Vec<UsageEvent>> {
        let events = self
            .lock()?
            .events
            .iter()
            .filter(|e| e.kind == kind && e.book_id == book_id)
            .cloned()
            .collect();
        Ok(newest_first(events))
    }

    async fn list_usage(&self, kind: UsageKind) -> PortResult<Vec<UsageEvent>> {
        let events = self
            .lock()?
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        Ok(newest_first(events))
    }

    async fn totals(&self) -> PortResult<LibraryTotals> {
        let tables = self.lock()?;
        let count = |kind: UsageKind| tables.events.iter().filter(|e| e.kind == kind).count() as i64;
        Ok(LibraryTotals {
            books: tables.books.len() as i64,
            users: tables.users.len() as i64,
            downloads: count(UsageKind::Download),
            reads: count(UsageKind::Read),
        })
    }

    async fn downloads_per_book(&self) -> PortResult<Vec<BookDownloads>> {
        let tables = self.lock()?;
        Ok(tables
            .books
            .iter()
            .map(|book| BookDownloads {
                id: book.id,
                title: book.title.clone(),
                downloads: tables
                    .events
                    .iter()
                    .filter(|e| e.kind == UsageKind::Download && e.book_id == book.id)
                    .count() as i64,
            })
            .collect())
    }

    async fn create_message(&self, message: NewMessage) -> PortResult<Message> {
        let mut tables = self.lock()?;
        let created = Message {
            id: tables.next_id(),
            user_id: message.user_id,
            name: message.name,
            email: message.email,
            message: message.message,
            reply: None,
            created_at: Utc::now(),
        };
        tables.messages.push(created.clone());
        Ok(created)
    }

    async fn list_messages(&self) -> PortResult<Vec<MessageListing>> {
        let tables = self.lock()?;
        Ok(tables
            .messages
            .iter()
            .rev()
            .map(|m| MessageListing {
                message: m.clone(),
                username: tables
                    .users
                    .iter()
                    .find(|row| row.user.id == m.user_id)
                    .map(|row| row.user.name.clone()),
            })
            .collect())
    }

    async fn list_messages_for_user(&self, user_id: UserId) -> PortResult<Vec<Message>> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .rev()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn reply_to_message(&self, message_id: MessageId, reply: &str) -> PortResult<()> {
        let mut tables = self.lock()?;
        let message = tables
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| PortError::NotFound("Message not found".to_string()))?;
        message.reply = Some(reply.to_string());
        Ok(())
    }

    async fn delete_message(&self, message_id: MessageId) -> PortResult<()> {
        let mut tables = self.lock()?;
        let before = tables.messages.len();
        tables.messages.retain(|m| m.id != message_id);
        if tables.messages.len() == before {
            return Err(PortError::NotFound("Message not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use library_core::domain::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            hashed_password: "hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let db = InMemoryDb::new();
        let first = db.create_user(new_user("a@x.com")).await.unwrap();

        let err = db.create_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
        assert_eq!(db.get_user_by_id(first.id).await.unwrap(), first);
        assert_eq!(db.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_book_drops_its_events() {
        let db = InMemoryDb::new();
        let book = db
            .create_book(NewBook {
                title: "Dune".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.record_usage(UsageKind::Read, 1, book.id).await.unwrap();

        db.delete_book(book.id).await.unwrap();
        assert_eq!(db.totals().await.unwrap(), LibraryTotals::default());
    }
}
