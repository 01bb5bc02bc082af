use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CnsiStore, StoredToken, TokenRepository};
use crate::models::cnsi::CnsiRecord;

/// Process-local store backed by concurrent maps.
///
/// Writes and reads can be made to fail with `sqlx::Error::PoolClosed`, which
/// lets callers exercise their storage-fault paths without a database.
#[derive(Default)]
pub struct MemoryStore {
    cnsis: DashMap<Uuid, CnsiRecord>,
    tokens: DashMap<(Uuid, String), StoredToken>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn cnsi_count(&self) -> usize {
        self.cnsis.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Raw access to a stored row, as persisted.
    pub fn stored_token(&self, cnsi_guid: Uuid, user_guid: &str) -> Option<StoredToken> {
        self.tokens
            .get(&(cnsi_guid, user_guid.to_string()))
            .map(|t| t.value().clone())
    }

    fn check_write(&self) -> Result<(), sqlx::Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolClosed);
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), sqlx::Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl CnsiStore for MemoryStore {
    async fn insert_cnsi(&self, cnsi: &CnsiRecord) -> Result<(), sqlx::Error> {
        self.check_write()?;
        if self.cnsis.contains_key(&cnsi.guid) {
            return Err(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint: guid {}",
                cnsi.guid
            )));
        }
        self.cnsis.insert(cnsi.guid, cnsi.clone());
        Ok(())
    }

    async fn list_cnsis(&self) -> Result<Vec<CnsiRecord>, sqlx::Error> {
        self.check_read()?;
        let mut all: Vec<CnsiRecord> = self.cnsis.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.guid.cmp(&b.guid)));
        Ok(all)
    }

    async fn get_cnsi(&self, guid: Uuid) -> Result<Option<CnsiRecord>, sqlx::Error> {
        self.check_read()?;
        Ok(self.cnsis.get(&guid).map(|e| e.value().clone()))
    }

    async fn delete_cnsi(&self, guid: Uuid) -> Result<bool, sqlx::Error> {
        self.check_write()?;
        let removed = self.cnsis.remove(&guid).is_some();
        if removed {
            self.tokens.retain(|(cnsi_guid, _), _| *cnsi_guid != guid);
        }
        Ok(removed)
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn upsert_token(&self, token: &StoredToken) -> Result<(), sqlx::Error> {
        self.check_write()?;
        self.tokens.insert(
            (token.cnsi_guid, token.user_guid.clone()),
            token.clone(),
        );
        Ok(())
    }

    async fn get_token(
        &self,
        cnsi_guid: Uuid,
        user_guid: &str,
    ) -> Result<Option<StoredToken>, sqlx::Error> {
        self.check_read()?;
        Ok(self.stored_token(cnsi_guid, user_guid))
    }

    async fn delete_token(&self, cnsi_guid: Uuid, user_guid: &str) -> Result<bool, sqlx::Error> {
        self.check_write()?;
        Ok(self
            .tokens
            .remove(&(cnsi_guid, user_guid.to_string()))
            .is_some())
    }
}
