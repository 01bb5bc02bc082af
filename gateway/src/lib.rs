//! CNSI Gateway: authenticated proxying to OAuth2-protected platform clusters.
//!
//! The binary wires these modules together; integration tests in `tests/`
//! drive them against mock clusters and the in-memory store.

pub mod api;
pub mod auth;
pub mod cli;
pub mod cnsi;
pub mod config;
pub mod errors;
pub mod models;
pub mod oauth;
pub mod proxy;
pub mod store;
pub mod tokens;
pub mod vault;

use std::sync::Arc;

use auth::CnsiAuth;
use cnsi::discovery::Discovery;
use cnsi::CnsiRegistry;
use oauth::{OAuthClients, OAuthTokenService};
use proxy::executor::ProxyExecutor;
use proxy::upstream::HttpClients;
use store::{CnsiStore, TokenRepository};
use tokens::TokenStore;
use vault::VaultCrypto;

/// Shared application state passed to handlers.
pub struct AppState {
    pub registry: CnsiRegistry,
    pub auth: CnsiAuth,
    pub executor: ProxyExecutor,
}

impl AppState {
    /// Wires every component over one store and one pair of HTTP clients.
    pub fn new<S>(
        store: Arc<S>,
        crypto: VaultCrypto,
        http: HttpClients,
        clients: OAuthClients,
    ) -> Self
    where
        S: CnsiStore + TokenRepository + 'static,
    {
        let http = Arc::new(http);
        let cnsis: Arc<dyn CnsiStore> = store.clone();
        let tokens = Arc::new(TokenStore::new(store, Arc::new(crypto)));
        let oauth = Arc::new(OAuthTokenService::new(http.clone()));

        Self {
            registry: CnsiRegistry::new(cnsis.clone(), Discovery::new(http.clone())),
            auth: CnsiAuth::new(cnsis.clone(), tokens.clone(), oauth.clone(), clients.clone()),
            executor: ProxyExecutor::new(cnsis, tokens, oauth, http, clients),
        }
    }
}
