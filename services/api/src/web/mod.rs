pub mod auth;
pub mod books;
pub mod extract;
pub mod guard;
pub mod messages;
pub mod reports;
pub mod rest;
pub mod router;
pub mod state;

pub use guard::{require_admin, require_auth};
pub use router::router;
