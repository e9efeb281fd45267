//! Test utilities for the api crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`). Only
//! compiled for tests or with the `test-support` feature.

use crate::adapters::{InMemoryDb, LocalAssetStorage};
use crate::assets::UsageAccounting;
use crate::config::Config;
use crate::web::state::AppState;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// A configuration that needs no environment and keeps uploads under `uploads_dir`.
pub fn test_config(uploads_dir: &Path) -> Config {
    Config {
        bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "postgres://unused".to_string(),
        log_level: Level::DEBUG,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        token_ttl: Duration::from_secs(7200),
        uploads_dir: uploads_dir.to_path_buf(),
        usage_accounting: UsageAccounting::OnSuccess,
        cors_origin: "http://localhost:5173".to_string(),
        max_upload_bytes: 1024 * 1024,
    }
}

/// Builds an `AppState` over an in-memory store, returning the store for inspection.
pub fn test_state(config: Config) -> (Arc<AppState>, Arc<InMemoryDb>) {
    let db = Arc::new(InMemoryDb::new());
    let storage = Arc::new(LocalAssetStorage::new(config.uploads_dir.clone()));
    let state = AppState::new(Arc::new(config), db.clone(), storage);
    (Arc::new(state), db)
}
