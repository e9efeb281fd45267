//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::assets::AssetGate;
use crate::auth::{CredentialService, TokenService};
use crate::config::Config;
use library_core::ledger::UsageLedger;
use library_core::ports::{AssetStorage, DatabaseService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseService>,
    pub storage: Arc<dyn AssetStorage>,
    pub tokens: Arc<TokenService>,
    pub credentials: CredentialService,
    pub assets: AssetGate,
    pub ledger: UsageLedger,
}

impl AppState {
    /// Wires the services together around the given store and asset storage.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        storage: Arc<dyn AssetStorage>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl));

        Self {
            credentials: CredentialService::new(db.clone(), tokens.clone()),
            assets: AssetGate::new(db.clone(), storage.clone(), config.usage_accounting),
            ledger: UsageLedger::new(db.clone()),
            config,
            db,
            storage,
            tokens,
        }
    }
}
