//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use library_core::domain::{
    Book, BookChanges, BookDownloads, BookId, LibraryTotals, Message, MessageId, MessageListing,
    NewBook, NewMessage, NewUser, Role, UsageEvent, UsageEventId, UsageKind, User,
    UserCredentials, UserId, UserUpdate,
};
use library_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps driver errors onto port errors. Unique violations become conflicts so
/// concurrent registrations with one email resolve to a clean rejection.
fn map_db_error(e: sqlx::Error, conflict: &str) -> PortError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            PortError::Conflict(conflict.to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    map_db_error(e, "Conflicting record")
}

fn not_found_or(e: sqlx::Error, what: &str) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        other => unexpected(other),
    }
}

fn parse_role(raw: &str) -> PortResult<Role> {
    raw.parse::<Role>()
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

fn usage_table(kind: UsageKind) -> (&'static str, &'static str, &'static str) {
    // (table, id column, timestamp column)
    match kind {
        UsageKind::Read => ("book_reads", "read_id", "read_date"),
        UsageKind::Download => ("downloads", "download_id", "download_date"),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    name: String,
    email: String,
    role: String,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: parse_role(&self.role)?,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: i64,
    email: String,
    password: String,
    role: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            id: self.id,
            email: self.email,
            role: parse_role(&self.role)?,
            hashed_password: self.password,
        })
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: i64,
    title: String,
    author: String,
    description: String,
    file_url: Option<String>,
    image_url: Option<String>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            description: self.description,
            file_url: self.file_url,
            image_url: self.image_url,
        }
    }
}

#[derive(FromRow)]
struct UsageRecord {
    id: i64,
    user_id: i64,
    book_id: i64,
    occurred_at: DateTime<Utc>,
}
impl UsageRecord {
    fn to_domain(self, kind: UsageKind) -> UsageEvent {
        UsageEvent {
            id: self.id,
            kind,
            user_id: self.user_id,
            book_id: self.book_id,
            occurred_at: self.occurred_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    user_id: i64,
    name: String,
    email: String,
    message: String,
    reply: Option<String>,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> Message {
        Message {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            email: self.email,
            message: self.message,
            reply: self.reply,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct MessageListingRecord {
    #[sqlx(flatten)]
    message: MessageRecord,
    username: Option<String>,
}

#[derive(FromRow)]
struct BookDownloadsRecord {
    id: i64,
    title: String,
    downloads: i64,
}

#[derive(FromRow)]
struct TotalsRecord {
    total_books: i64,
    total_users: i64,
    total_downloads: i64,
    total_reads: i64,
}

const BOOK_COLUMNS: &str = "id, title, author, description, file_url, image_url";
const MESSAGE_COLUMNS: &str = "m.id, m.user_id, m.name, m.email, m.message, m.reply, m.created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (name, email, password, role) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, email, role",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User already exists"))?;

        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, "User"))?;

        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: UserId) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, role FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, "User"))?;

        record.to_domain()
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, role FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn update_user(&self, user_id: UserId, update: &UserUpdate) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET name = $1, email = $2, role = $3 WHERE id = $4")
            .bind(&update.name)
            .bind(&update.email)
            .bind(update.role.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "Email already in use"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    async fn user_names(&self, user_ids: &[UserId]) -> PortResult<HashMap<UserId, String>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM users WHERE id = ANY($1)")
                .bind(user_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;

        Ok(rows.into_iter().collect())
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {} FROM books ORDER BY id",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn get_book(&self, book_id: BookId) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, "Book"))?;

        Ok(record.to_domain())
    }

    async fn create_book(&self, book: NewBook) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "INSERT INTO books (title, author, description, file_url, image_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.file_url)
        .bind(&book.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn update_book(&self, book_id: BookId, changes: &BookChanges) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "UPDATE books SET \
               title = COALESCE($1, title), \
               author = COALESCE($2, author), \
               description = COALESCE($3, description), \
               file_url = COALESCE($4, file_url), \
               image_url = COALESCE($5, image_url) \
             WHERE id = $6 RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(&changes.description)
        .bind(&changes.file_url)
        .bind(&changes.image_url)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, "Book"))?;

        Ok(record.to_domain())
    }

    async fn delete_book(&self, book_id: BookId) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "DELETE FROM books WHERE id = $1 RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, "Book"))?;

        Ok(record.to_domain())
    }

    async fn record_usage(
        &self,
        kind: UsageKind,
        user_id: UserId,
        book_id: BookId,
    ) -> PortResult<UsageEventId> {
        let (table, id_column, _) = usage_table(kind);
        let (id,): (i64,) = sqlx::query_as(&format!(
            "INSERT INTO {} (user_id, book_id) VALUES ($1, $2) RETURNING {}",
            table, id_column
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(id)
    }

    async fn usage_for_book(&self, kind: UsageKind, book_id: BookId) -> PortResult<Vec<UsageEvent>> {
        let (table, id_column, date_column) = usage_table(kind);
        let records = sqlx::query_as::<_, UsageRecord>(&format!(
            "SELECT {id} AS id, user_id, book_id, {date} AS occurred_at FROM {table} \
             WHERE book_id = $1 ORDER BY {date} DESC, {id} DESC",
            id = id_column,
            date = date_column,
            table = table
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain(kind)).collect())
    }

    async fn list_usage(&self, kind: UsageKind) -> PortResult<Vec<UsageEvent>> {
        let (table, id_column, date_column) = usage_table(kind);
        let records = sqlx::query_as::<_, UsageRecord>(&format!(
            "SELECT {id} AS id, user_id, book_id, {date} AS occurred_at FROM {table} \
             ORDER BY {date} DESC, {id} DESC",
            id = id_column,
            date = date_column,
            table = table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain(kind)).collect())
    }

    async fn totals(&self) -> PortResult<LibraryTotals> {
        let record = sqlx::query_as::<_, TotalsRecord>(
            "SELECT \
               (SELECT COUNT(*) FROM books) AS total_books, \
               (SELECT COUNT(*) FROM users) AS total_users, \
               (SELECT COUNT(*) FROM downloads) AS total_downloads, \
               (SELECT COUNT(*) FROM book_reads) AS total_reads",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(LibraryTotals {
            books: record.total_books,
            users: record.total_users,
            downloads: record.total_downloads,
            reads: record.total_reads,
        })
    }

    async fn downloads_per_book(&self) -> PortResult<Vec<BookDownloads>> {
        let records = sqlx::query_as::<_, BookDownloadsRecord>(
            "SELECT b.id, b.title, COUNT(d.download_id) AS downloads \
             FROM books b LEFT JOIN downloads d ON b.id = d.book_id \
             GROUP BY b.id, b.title ORDER BY b.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records
            .into_iter()
            .map(|r| BookDownloads {
                id: r.id,
                title: r.title,
                downloads: r.downloads,
            })
            .collect())
    }

    async fn create_message(&self, message: NewMessage) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages AS m (user_id, name, email, message) VALUES ($1, $2, $3, $4) \
             RETURNING m.id, m.user_id, m.name, m.email, m.message, m.reply, m.created_at",
        )
        .bind(message.user_id)
        .bind(&message.name)
        .bind(&message.email)
        .bind(&message.message)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn list_messages(&self) -> PortResult<Vec<MessageListing>> {
        let records = sqlx::query_as::<_, MessageListingRecord>(&format!(
            "SELECT {}, u.name AS username FROM messages m \
             LEFT JOIN users u ON m.user_id = u.id ORDER BY m.id DESC",
            MESSAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records
            .into_iter()
            .map(|r| MessageListing {
                message: r.message.to_domain(),
                username: r.username,
            })
            .collect())
    }

    async fn list_messages_for_user(&self, user_id: UserId) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {} FROM messages m WHERE m.user_id = $1 ORDER BY m.id DESC",
            MESSAGE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn reply_to_message(&self, message_id: MessageId, reply: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE messages SET reply = $1 WHERE id = $2")
            .bind(reply)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Message not found".to_string()));
        }
        Ok(())
    }

    async fn delete_message(&self, message_id: MessageId) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Message not found".to_string()));
        }
        Ok(())
    }
}
