use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CnsiStore, StoredToken, TokenRepository};
use crate::models::cnsi::{CnsiRecord, CnsiType};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CnsiStore for PgStore {
    async fn insert_cnsi(&self, cnsi: &CnsiRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO cnsis (guid, name, cnsi_type, api_endpoint, auth_endpoint, token_endpoint, doppler_logging_endpoint, skip_ssl_validation)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(cnsi.guid)
        .bind(&cnsi.name)
        .bind(cnsi.cnsi_type.as_str())
        .bind(&cnsi.api_endpoint)
        .bind(&cnsi.authorization_endpoint)
        .bind(&cnsi.token_endpoint)
        .bind(&cnsi.doppler_logging_endpoint)
        .bind(cnsi.skip_ssl_validation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_cnsis(&self) -> Result<Vec<CnsiRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CnsiRow>(
            "SELECT guid, name, cnsi_type, api_endpoint, auth_endpoint, token_endpoint, doppler_logging_endpoint, skip_ssl_validation FROM cnsis ORDER BY name ASC, guid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CnsiRecord::try_from).collect()
    }

    async fn get_cnsi(&self, guid: Uuid) -> Result<Option<CnsiRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, CnsiRow>(
            "SELECT guid, name, cnsi_type, api_endpoint, auth_endpoint, token_endpoint, doppler_logging_endpoint, skip_ssl_validation FROM cnsis WHERE guid = $1",
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CnsiRecord::try_from).transpose()
    }

    async fn delete_cnsi(&self, guid: Uuid) -> Result<bool, sqlx::Error> {
        // tokens.cnsi_guid cascades
        let result = sqlx::query("DELETE FROM cnsis WHERE guid = $1")
            .bind(guid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenRepository for PgStore {
    async fn upsert_token(&self, token: &StoredToken) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO tokens (cnsi_guid, user_guid, auth_token, refresh_token, token_expiry, user_identity)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (cnsi_guid, user_guid) DO UPDATE SET
                   auth_token = EXCLUDED.auth_token,
                   refresh_token = EXCLUDED.refresh_token,
                   token_expiry = EXCLUDED.token_expiry,
                   user_identity = EXCLUDED.user_identity,
                   updated_at = NOW()"#,
        )
        .bind(token.cnsi_guid)
        .bind(&token.user_guid)
        .bind(&token.auth_token)
        .bind(&token.refresh_token)
        .bind(token.token_expiry)
        .bind(&token.user_identity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_token(
        &self,
        cnsi_guid: Uuid,
        user_guid: &str,
    ) -> Result<Option<StoredToken>, sqlx::Error> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT cnsi_guid, user_guid, auth_token, refresh_token, token_expiry, user_identity FROM tokens WHERE cnsi_guid = $1 AND user_guid = $2",
        )
        .bind(cnsi_guid)
        .bind(user_guid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StoredToken::from))
    }

    async fn delete_token(&self, cnsi_guid: Uuid, user_guid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tokens WHERE cnsi_guid = $1 AND user_guid = $2")
            .bind(cnsi_guid)
            .bind(user_guid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct CnsiRow {
    guid: Uuid,
    name: String,
    cnsi_type: String,
    api_endpoint: String,
    auth_endpoint: String,
    token_endpoint: String,
    doppler_logging_endpoint: String,
    skip_ssl_validation: bool,
}

impl TryFrom<CnsiRow> for CnsiRecord {
    type Error = sqlx::Error;

    fn try_from(row: CnsiRow) -> Result<Self, Self::Error> {
        let cnsi_type = row
            .cnsi_type
            .parse::<CnsiType>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        Ok(CnsiRecord {
            guid: row.guid,
            name: row.name,
            cnsi_type,
            api_endpoint: row.api_endpoint,
            authorization_endpoint: row.auth_endpoint,
            token_endpoint: row.token_endpoint,
            doppler_logging_endpoint: row.doppler_logging_endpoint,
            skip_ssl_validation: row.skip_ssl_validation,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    cnsi_guid: Uuid,
    user_guid: String,
    auth_token: Vec<u8>,
    refresh_token: Vec<u8>,
    token_expiry: DateTime<Utc>,
    user_identity: serde_json::Value,
}

impl From<TokenRow> for StoredToken {
    fn from(row: TokenRow) -> Self {
        StoredToken {
            cnsi_guid: row.cnsi_guid,
            user_guid: row.user_guid,
            auth_token: row.auth_token,
            refresh_token: row.refresh_token,
            token_expiry: row.token_expiry,
            user_identity: row.user_identity,
        }
    }
}
