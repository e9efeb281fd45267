//! services/api/src/web/rest.rs
//!
//! The index route and the master definition for the OpenAPI specification.

use crate::web::{auth, books, messages, reports};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::list_users_handler,
        auth::update_user_handler,
        auth::delete_user_handler,
        books::list_books_handler,
        books::get_book_handler,
        books::create_book_handler,
        books::update_book_handler,
        books::delete_book_handler,
        books::view_book_handler,
        books::download_book_handler,
        reports::book_report_handler,
        reports::admin_report_handler,
        reports::totals_handler,
        reports::list_reads_handler,
        reports::list_downloads_handler,
        messages::send_message_handler,
        messages::list_messages_handler,
        messages::my_messages_handler,
        messages::reply_handler,
        messages::delete_message_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UpdateUserRequest,
            auth::UserResponse,
            auth::MessageResponse,
            books::BookResponse,
            books::BookCreatedResponse,
            books::BookUpload,
            reports::BookReportResponse,
            reports::BookSummary,
            reports::UsageEntryResponse,
            reports::BookDownloadsResponse,
            reports::TotalsResponse,
            reports::UsageEventResponse,
            messages::SendMessageRequest,
            messages::ReplyRequest,
            messages::MessageView,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Digital Library API", description = "Catalogue, protected book access and usage reporting.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// Index
//=========================================================================================

/// GET / - Liveness banner
pub async fn index_handler() -> &'static str {
    "Digital Library Backend is running!"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_protected_path_has_a_security_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/books/view/{id}"));
        assert!(components.schemas.contains_key("BookUpload"));
        assert!(doc.paths.paths.contains_key("/admin/report"));
    }
}
