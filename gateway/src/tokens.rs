//! Encrypted per-(cluster, user) token persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::token::{TokenRecord, UserIdentity};
use crate::store::{StoredToken, TokenRepository};
use crate::vault::VaultCrypto;

pub struct TokenStore {
    repo: Arc<dyn TokenRepository>,
    crypto: Arc<VaultCrypto>,
}

impl TokenStore {
    pub fn new(repo: Arc<dyn TokenRepository>, crypto: Arc<VaultCrypto>) -> Self {
        Self { repo, crypto }
    }

    /// Seals both tokens, then upserts the row keyed by
    /// `(cnsi_guid, identity.user_guid)`. Nothing is written unless both
    /// tokens sealed successfully.
    pub async fn save(
        &self,
        cnsi_guid: Uuid,
        identity: &UserIdentity,
        auth_token: &str,
        refresh_token: &str,
        token_expiry: DateTime<Utc>,
    ) -> Result<TokenRecord, AppError> {
        let stored = StoredToken {
            cnsi_guid,
            user_guid: identity.user_guid.clone(),
            auth_token: self.crypto.seal(auth_token)?,
            refresh_token: self.crypto.seal(refresh_token)?,
            token_expiry,
            user_identity: serde_json::to_value(identity)
                .map_err(|e| AppError::Internal(e.into()))?,
        };

        self.repo.upsert_token(&stored).await?;
        tracing::debug!(cnsi_guid = %cnsi_guid, user_guid = %identity.user_guid, expiry = %token_expiry, "saved cnsi token");

        Ok(TokenRecord {
            cnsi_guid,
            user_guid: identity.user_guid.clone(),
            auth_token: auth_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_expiry,
            identity: identity.clone(),
        })
    }

    /// `Ok(None)` when the user has no token for the cluster.
    pub async fn lookup(
        &self,
        cnsi_guid: Uuid,
        user_guid: &str,
    ) -> Result<Option<TokenRecord>, AppError> {
        let Some(stored) = self.repo.get_token(cnsi_guid, user_guid).await? else {
            return Ok(None);
        };

        let identity: UserIdentity = serde_json::from_value(stored.user_identity)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("stored user identity unreadable: {}", e)))?;

        Ok(Some(TokenRecord {
            cnsi_guid: stored.cnsi_guid,
            user_guid: stored.user_guid,
            auth_token: self.crypto.open(&stored.auth_token)?,
            refresh_token: self.crypto.open(&stored.refresh_token)?,
            token_expiry: stored.token_expiry,
            identity,
        }))
    }

    /// Returns false when there was nothing to delete.
    pub async fn delete(&self, cnsi_guid: Uuid, user_guid: &str) -> Result<bool, AppError> {
        let removed = self.repo.delete_token(cnsi_guid, user_guid).await?;
        if removed {
            tracing::info!(cnsi_guid = %cnsi_guid, user_guid = %user_guid, "removed cnsi token");
        }
        Ok(removed)
    }
}
