//! services/api/src/web/reports.rs
//!
//! Read-side views over the usage ledger.

use crate::error::AppError;
use crate::web::books::book_not_found;
use crate::web::extract::IdPath;
use crate::web::state::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use library_core::domain::{
    BookDownloads, BookId, LibraryTotals, UsageEntry, UsageEvent, UsageEventId, UsageKind, UserId,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BookSummary {
    pub title: String,
    pub author: String,
}

/// One read or download with the user's current display name.
#[derive(Serialize, ToSchema)]
pub struct UsageEntryResponse {
    pub id: UsageEventId,
    pub user_id: UserId,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

impl From<UsageEntry> for UsageEntryResponse {
    fn from(entry: UsageEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            name: entry.name,
            timestamp: entry.occurred_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookReportResponse {
    pub book: BookSummary,
    pub total_reads: usize,
    pub total_downloads: usize,
    pub reads: Vec<UsageEntryResponse>,
    pub downloads: Vec<UsageEntryResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct BookDownloadsResponse {
    pub id: BookId,
    pub title: String,
    pub downloads: i64,
}

impl From<BookDownloads> for BookDownloadsResponse {
    fn from(row: BookDownloads) -> Self {
        Self {
            id: row.id,
            title: row.title,
            downloads: row.downloads,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TotalsResponse {
    pub total_books: i64,
    pub total_users: i64,
    pub total_downloads: i64,
    pub total_reads: i64,
}

impl From<LibraryTotals> for TotalsResponse {
    fn from(totals: LibraryTotals) -> Self {
        Self {
            total_books: totals.books,
            total_users: totals.users,
            total_downloads: totals.downloads,
            total_reads: totals.reads,
        }
    }
}

/// A raw ledger event.
#[derive(Serialize, ToSchema)]
pub struct UsageEventResponse {
    pub id: UsageEventId,
    #[schema(value_type = String)]
    pub kind: UsageKind,
    pub user_id: UserId,
    pub book_id: BookId,
    pub timestamp: DateTime<Utc>,
}

impl From<UsageEvent> for UsageEventResponse {
    fn from(event: UsageEvent) -> Self {
        Self {
            id: event.id,
            kind: event.kind,
            user_id: event.user_id,
            book_id: event.book_id,
            timestamp: event.occurred_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /books/report/{id} - Who read and downloaded a book, and when
#[utoipa::path(
    get,
    path = "/books/report/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Usage history, newest first", body = BookReportResponse),
        (status = 404, description = "No such book", body = crate::web::auth::MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn book_report_handler(
    State(state): State<Arc<AppState>>,
    IdPath(book_id): IdPath<BookId>,
) -> Result<Json<BookReportResponse>, AppError> {
    let book = state.db.get_book(book_id).await.map_err(book_not_found)?;
    let report = state.ledger.aggregate_for_book(book_id).await?;

    Ok(Json(BookReportResponse {
        book: BookSummary {
            title: book.title,
            author: book.author,
        },
        total_reads: report.reads.len(),
        total_downloads: report.downloads.len(),
        reads: report.reads.into_iter().map(Into::into).collect(),
        downloads: report.downloads.into_iter().map(Into::into).collect(),
    }))
}

/// GET /admin/report - Download counts for every book
#[utoipa::path(
    get,
    path = "/admin/report",
    responses(
        (status = 200, description = "Downloads per book", body = [BookDownloadsResponse]),
        (status = 403, description = "Admins only", body = crate::web::auth::MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn admin_report_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookDownloadsResponse>>, AppError> {
    let rows = state.ledger.downloads_per_book().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /totals - Dashboard counters
#[utoipa::path(
    get,
    path = "/totals",
    responses((status = 200, description = "Library-wide totals", body = TotalsResponse))
)]
pub async fn totals_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TotalsResponse>, AppError> {
    let totals = state.ledger.count_all().await?;
    Ok(Json(totals.into()))
}

/// GET /reads - Every read event, newest first
#[utoipa::path(
    get,
    path = "/reads",
    responses((status = 200, description = "Read events", body = [UsageEventResponse]))
)]
pub async fn list_reads_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UsageEventResponse>>, AppError> {
    list_events(&state, UsageKind::Read).await
}

/// GET /downloads - Every download event, newest first
#[utoipa::path(
    get,
    path = "/downloads",
    responses((status = 200, description = "Download events", body = [UsageEventResponse]))
)]
pub async fn list_downloads_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UsageEventResponse>>, AppError> {
    list_events(&state, UsageKind::Download).await
}

async fn list_events(
    state: &AppState,
    kind: UsageKind,
) -> Result<Json<Vec<UsageEventResponse>>, AppError> {
    let events = state.ledger.list(kind).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}
