//! Shared fixtures: in-memory storage, real HTTP clients, minted JWTs.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use cnsi_gateway::models::cnsi::{CnsiRecord, CnsiType};
use cnsi_gateway::models::token::UserIdentity;
use cnsi_gateway::oauth::{OAuthClient, OAuthClients, OAuthTokenService};
use cnsi_gateway::proxy::executor::ProxyExecutor;
use cnsi_gateway::proxy::upstream::HttpClients;
use cnsi_gateway::store::memory::MemoryStore;
use cnsi_gateway::store::CnsiStore;
use cnsi_gateway::tokens::TokenStore;
use cnsi_gateway::vault::VaultCrypto;

pub const MASTER_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
pub const USER: &str = "portal-user-1";

pub fn http_clients() -> HttpClients {
    HttpClients::new(Duration::from_secs(5), Duration::from_secs(2)).unwrap()
}

pub fn oauth_clients(hce_token_endpoint: Option<String>) -> OAuthClients {
    OAuthClients {
        hcf: OAuthClient {
            client_id: "cf".into(),
            client_secret: String::new(),
            token_endpoint: None,
        },
        hce: OAuthClient {
            client_id: "hce".into(),
            client_secret: "hce-secret".into(),
            token_endpoint: hce_token_endpoint,
        },
    }
}

/// An access token the way a cluster's UAA would issue it.
pub fn mint_token(user_id: &str, exp: i64) -> String {
    encode(
        &Header::default(),
        &json!({
            "user_id": user_id,
            "user_name": "admin",
            "scope": ["cloud_controller.read", "cloud_controller.write"],
            "exp": exp,
        }),
        &EncodingKey::from_secret(b"cluster-signing-key"),
    )
    .unwrap()
}

pub fn cnsi(api_endpoint: &str, token_endpoint: &str, cnsi_type: CnsiType) -> CnsiRecord {
    CnsiRecord {
        guid: Uuid::new_v4(),
        name: "test-cluster".into(),
        cnsi_type,
        api_endpoint: api_endpoint.to_string(),
        authorization_endpoint: String::new(),
        token_endpoint: token_endpoint.to_string(),
        doppler_logging_endpoint: String::new(),
        skip_ssl_validation: true,
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub tokens: Arc<TokenStore>,
    pub executor: ProxyExecutor,
}

impl Harness {
    pub fn new(clients: OAuthClients) -> Self {
        let store = Arc::new(MemoryStore::new());
        let http = Arc::new(http_clients());
        let tokens = Arc::new(TokenStore::new(
            store.clone(),
            Arc::new(VaultCrypto::new(MASTER_KEY).unwrap()),
        ));
        let oauth = Arc::new(OAuthTokenService::new(http.clone()));
        let executor = ProxyExecutor::new(store.clone(), tokens.clone(), oauth, http, clients);
        Self {
            store,
            tokens,
            executor,
        }
    }

    pub async fn add_cnsi(&self, record: &CnsiRecord) {
        self.store.insert_cnsi(record).await.unwrap();
    }

    /// Stores a token pair for [`USER`] on the given cluster.
    pub async fn add_token(&self, cnsi_guid: Uuid, access: &str, refresh: &str, expiry: DateTime<Utc>) {
        let identity = UserIdentity {
            user_guid: USER.to_string(),
            user_name: Some("admin".into()),
            scopes: vec![],
            token_expiry: expiry.timestamp(),
        };
        self.tokens
            .save(cnsi_guid, &identity, access, refresh, expiry)
            .await
            .unwrap();
    }
}
