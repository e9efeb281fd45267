//! services/api/src/web/books.rs
//!
//! Catalogue endpoints and the two protected asset routes. Book uploads
//! arrive as multipart forms with the text fields `title`, `author`,
//! `description` and the file parts `file` and `image`.

use crate::assets::ServedAsset;
use crate::auth::Identity;
use crate::error::AppError;
use crate::web::auth::MessageResponse;
use crate::web::extract::IdPath;
use crate::web::state::AppState;
use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use library_core::domain::{AssetKind, Book, BookChanges, BookId, NewBook, UsageKind};
use library_core::ports::{AssetStorage, PortError};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use utoipa::ToSchema;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub file_url: Option<String>,
    pub image_url: Option<String>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            file_url: book.file_url,
            image_url: book.image_url,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BookCreatedResponse {
    pub message: String,
    pub book_id: BookId,
}

/// The multipart book form as published in the OpenAPI document; handlers
/// read the parts directly.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct BookUpload {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

pub(crate) fn book_not_found(err: PortError) -> AppError {
    match err {
        PortError::NotFound(_) => AppError::NotFound("Book not found".to_string()),
        other => other.into(),
    }
}

//=========================================================================================
// Multipart Form Handling
//=========================================================================================

/// A parsed book form. Uploaded parts are already in storage; `file_url` and
/// `image_url` hold their references.
#[derive(Debug, Default)]
struct BookForm {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    file_url: Option<String>,
    image_url: Option<String>,
}

fn invalid_form(err: MultipartError) -> AppError {
    AppError::Validation(format!("Invalid form data: {}", err.body_text()))
}

/// Blank text fields count as absent.
fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn discard(storage: &dyn AssetStorage, reference: &str) {
    if let Err(e) = storage.remove(reference).await {
        warn!("Failed to remove asset {}: {}", reference, e);
    }
}

impl BookForm {
    async fn read(storage: &dyn AssetStorage, multipart: &mut Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        if let Err(err) = form.fill(storage, multipart).await {
            form.discard_uploads(storage).await;
            return Err(err);
        }
        Ok(form)
    }

    async fn fill(
        &mut self,
        storage: &dyn AssetStorage,
        multipart: &mut Multipart,
    ) -> Result<(), AppError> {
        while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(kind) = AssetKind::for_form_field(&name) {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(invalid_form)?;
                // Browsers send an empty part when no file was chosen.
                if data.is_empty() {
                    continue;
                }

                let reference = storage.store(kind, &original_name, data).await?;
                let slot = match kind {
                    AssetKind::Document => &mut self.file_url,
                    AssetKind::Image => &mut self.image_url,
                };
                if let Some(previous) = slot.replace(reference) {
                    discard(storage, &previous).await;
                }
                continue;
            }

            match name.as_str() {
                "title" => self.title = non_blank(field.text().await.map_err(invalid_form)?),
                "author" => self.author = non_blank(field.text().await.map_err(invalid_form)?),
                "description" => {
                    self.description = non_blank(field.text().await.map_err(invalid_form)?)
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn discard_uploads(&self, storage: &dyn AssetStorage) {
        for reference in [&self.file_url, &self.image_url].into_iter().flatten() {
            discard(storage, reference).await;
        }
    }
}

//=========================================================================================
// Catalogue Handlers
//=========================================================================================

/// GET /books - List all books
#[utoipa::path(
    get,
    path = "/books",
    responses((status = 200, description = "All books", body = [BookResponse]))
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    let books = state.db.list_books().await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /books/{id} - Fetch one book
#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "No such book", body = MessageResponse)
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    IdPath(book_id): IdPath<BookId>,
) -> Result<Json<BookResponse>, AppError> {
    let book = state.db.get_book(book_id).await.map_err(book_not_found)?;
    Ok(Json(book.into()))
}

/// POST /books - Add a book with its PDF and cover
#[utoipa::path(
    post,
    path = "/books",
    request_body(content = BookUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Book added", body = BookCreatedResponse),
        (status = 400, description = "Missing title or malformed form", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let storage = state.storage.as_ref();
    let form = BookForm::read(storage, &mut multipart).await?;

    let Some(title) = form.title.clone() else {
        form.discard_uploads(storage).await;
        return Err(AppError::Validation("Title is required".to_string()));
    };

    let new_book = NewBook {
        title,
        author: form.author.clone().unwrap_or_default(),
        description: form.description.clone().unwrap_or_default(),
        file_url: form.file_url.clone(),
        image_url: form.image_url.clone(),
    };
    let book = match state.db.create_book(new_book).await {
        Ok(book) => book,
        Err(e) => {
            form.discard_uploads(storage).await;
            return Err(e.into());
        }
    };

    info!("User {} added book {}", identity.user_id, book.id);
    Ok((
        StatusCode::CREATED,
        Json(BookCreatedResponse {
            message: "Book added successfully".to_string(),
            book_id: book.id,
        }),
    ))
}

/// PUT /books/{id} - Partially update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    request_body(content = BookUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Book updated", body = MessageResponse),
        (status = 404, description = "No such book", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_book_handler(
    State(state): State<Arc<AppState>>,
    IdPath(book_id): IdPath<BookId>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let storage = state.storage.as_ref();
    let old = state.db.get_book(book_id).await.map_err(book_not_found)?;
    let form = BookForm::read(storage, &mut multipart).await?;

    let changes = BookChanges {
        title: form.title.clone(),
        author: form.author.clone(),
        description: form.description.clone(),
        file_url: form.file_url.clone(),
        image_url: form.image_url.clone(),
    };
    if let Err(e) = state.db.update_book(book_id, &changes).await {
        form.discard_uploads(storage).await;
        return Err(book_not_found(e));
    }

    // Replaced assets are removed once the record points at the new ones.
    let replaced = [
        (old.file_url, &changes.file_url),
        (old.image_url, &changes.image_url),
    ];
    for (previous, current) in replaced {
        if let (Some(previous), Some(_)) = (previous, current) {
            discard(storage, &previous).await;
        }
    }

    info!("Book {} updated", book_id);
    Ok(MessageResponse::new("Book updated successfully"))
}

/// DELETE /books/{id} - Delete a book, its assets and its usage history
#[utoipa::path(
    delete,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "No such book", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    IdPath(book_id): IdPath<BookId>,
) -> Result<Json<MessageResponse>, AppError> {
    let book = state.db.delete_book(book_id).await.map_err(book_not_found)?;

    for reference in [&book.file_url, &book.image_url].into_iter().flatten() {
        discard(state.storage.as_ref(), reference).await;
    }

    info!("Book {} deleted", book_id);
    Ok(MessageResponse::new("Book deleted successfully"))
}

//=========================================================================================
// Protected Assets
//=========================================================================================

/// GET /books/view/{id} - Stream the book's PDF inline and record a read
#[utoipa::path(
    get,
    path = "/books/view/{id}",
    params(
        ("id" = i64, Path, description = "Book id"),
        ("token" = Option<String>, Query, description = "Access token, when no Authorization header can be sent")
    ),
    responses(
        (status = 200, description = "The PDF, streamed inline"),
        (status = 401, description = "Missing or invalid token", body = MessageResponse),
        (status = 404, description = "No such book or file", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn view_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    IdPath(book_id): IdPath<BookId>,
) -> Result<Response, AppError> {
    let served = state.assets.serve(book_id, &identity, UsageKind::Read).await?;
    stream_asset(served).await
}

/// GET /books/download/{id} - Download the book's PDF and record a download
#[utoipa::path(
    get,
    path = "/books/download/{id}",
    params(
        ("id" = i64, Path, description = "Book id"),
        ("token" = Option<String>, Query, description = "Access token, when no Authorization header can be sent")
    ),
    responses(
        (status = 200, description = "The PDF as an attachment"),
        (status = 401, description = "Missing or invalid token", body = MessageResponse),
        (status = 404, description = "No such book or file", body = MessageResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    IdPath(book_id): IdPath<BookId>,
) -> Result<Response, AppError> {
    let served = state
        .assets
        .serve(book_id, &identity, UsageKind::Download)
        .await?;
    stream_asset(served).await
}

async fn stream_asset(served: ServedAsset) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(&served.path).await.map_err(|e| {
        warn!("Failed to open {}: {}", served.path.display(), e);
        AppError::AssetMissing
    })?;

    Response::builder()
        .header(header::CONTENT_TYPE, served.content_type)
        .header(header::CONTENT_DISPOSITION, served.content_disposition())
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::StorageFailure(e.to_string()))
}
