//! services/api/src/web/router.rs
//!
//! Assembles the HTTP surface. Routes fall into three groups: public,
//! authenticated (any role), and administrator-only.

use crate::web::{
    auth::{
        delete_user_handler, list_users_handler, login_handler, register_handler,
        update_user_handler,
    },
    books::{
        create_book_handler, delete_book_handler, download_book_handler, get_book_handler,
        list_books_handler, update_book_handler, view_book_handler,
    },
    guard::{require_admin, require_auth},
    messages::{
        delete_message_handler, list_messages_handler, my_messages_handler, reply_handler,
        send_message_handler,
    },
    reports::{
        admin_report_handler, book_report_handler, list_downloads_handler, list_reads_handler,
        totals_handler,
    },
    rest::index_handler,
    state::AppState,
};
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::Uri,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use library_core::domain::AssetKind;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info_span, Span};

/// The path of a request as it appears in logs. The query is left out since
/// asset links carry the access token there.
fn logged_path(uri: &Uri) -> &str {
    uri.path()
}

fn request_span(req: &Request) -> Span {
    info_span!("request", method = %req.method(), path = %logged_path(req.uri()))
}

pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(index_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/books", get(list_books_handler))
        .route("/books/{id}", get(get_book_handler))
        .route("/totals", get(totals_handler))
        .route("/reads", get(list_reads_handler))
        .route("/downloads", get(list_downloads_handler));

    // Any authenticated identity
    let protected_routes = Router::new()
        .route("/auth", get(list_users_handler))
        .route("/auth/", get(list_users_handler))
        .route(
            "/auth/{id}",
            put(update_user_handler).delete(delete_user_handler),
        )
        .route("/books", post(create_book_handler))
        .route(
            "/books/{id}",
            put(update_book_handler).delete(delete_book_handler),
        )
        .route("/books/view/{id}", get(view_book_handler))
        .route("/books/download/{id}", get(download_book_handler))
        .route("/books/report/{id}", get(book_report_handler))
        .route("/messages", post(send_message_handler))
        .route("/messages/user", get(my_messages_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Administrators only. Layers run outside-in, so authentication comes first.
    let admin_routes = Router::new()
        .route("/admin/report", get(admin_report_handler))
        .route("/messages", get(list_messages_handler))
        .route("/messages/{id}", delete(delete_message_handler))
        .route("/messages/{id}/reply", put(reply_handler))
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let images_dir = state.config.uploads_dir.join(AssetKind::Image.directory());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .nest_service("/uploads/images", ServeDir::new(images_dir))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_paths_drop_the_query_string() {
        let uri: Uri = "/books/view/7?token=header.payload.signature".parse().unwrap();
        assert_eq!(logged_path(&uri), "/books/view/7");
        assert!(!logged_path(&uri).contains("token"));
    }
}
