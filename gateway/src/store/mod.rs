//! Persistence seams for the registry and the token store.
//!
//! Implementations: [`postgres::PgStore`] (shared `sqlx` pool) and
//! [`memory::MemoryStore`] (process-local, used by tests and dry runs).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::cnsi::CnsiRecord;

/// A token row as it sits in storage: both tokens sealed by the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub cnsi_guid: Uuid,
    pub user_guid: String,
    pub auth_token: Vec<u8>,
    pub refresh_token: Vec<u8>,
    pub token_expiry: DateTime<Utc>,
    pub user_identity: serde_json::Value,
}

#[async_trait]
pub trait CnsiStore: Send + Sync {
    /// Inserts a new record in a single statement.
    async fn insert_cnsi(&self, cnsi: &CnsiRecord) -> Result<(), sqlx::Error>;

    /// All records ordered by name, then guid.
    async fn list_cnsis(&self) -> Result<Vec<CnsiRecord>, sqlx::Error>;

    async fn get_cnsi(&self, guid: Uuid) -> Result<Option<CnsiRecord>, sqlx::Error>;

    /// Removes the record and every token issued for it. Returns false when
    /// no such record existed.
    async fn delete_cnsi(&self, guid: Uuid) -> Result<bool, sqlx::Error>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Inserts or overwrites the row keyed by `(cnsi_guid, user_guid)`.
    async fn upsert_token(&self, token: &StoredToken) -> Result<(), sqlx::Error>;

    async fn get_token(
        &self,
        cnsi_guid: Uuid,
        user_guid: &str,
    ) -> Result<Option<StoredToken>, sqlx::Error>;

    async fn delete_token(&self, cnsi_guid: Uuid, user_guid: &str) -> Result<bool, sqlx::Error>;
}
