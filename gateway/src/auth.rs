//! Connecting a gateway user to a cluster (login) and disconnecting (logout).

use std::sync::Arc;

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::cnsi::CnsiRecord;
use crate::models::token::{TokenRecord, UserIdentity};
use crate::oauth::{self, OAuthClients, OAuthTokenService, TokenGrant};
use crate::store::CnsiStore;
use crate::tokens::TokenStore;

pub struct CnsiAuth {
    cnsis: Arc<dyn CnsiStore>,
    tokens: Arc<TokenStore>,
    oauth: Arc<OAuthTokenService>,
    clients: OAuthClients,
}

impl CnsiAuth {
    pub fn new(
        cnsis: Arc<dyn CnsiStore>,
        tokens: Arc<TokenStore>,
        oauth: Arc<OAuthTokenService>,
        clients: OAuthClients,
    ) -> Self {
        Self {
            cnsis,
            tokens,
            oauth,
            clients,
        }
    }

    /// Runs a password grant against the cluster's token endpoint and stores
    /// the resulting token pair for `user_guid`.
    pub async fn login(
        &self,
        cnsi_guid: Uuid,
        user_guid: &str,
        username: &str,
        password: &str,
    ) -> Result<TokenRecord, AppError> {
        let (cnsi, grant, mut identity) = self.grant(cnsi_guid, username, password).await?;
        identity.user_guid = user_guid.to_string();

        let record = self
            .tokens
            .save(
                cnsi.guid,
                &identity,
                &grant.access_token,
                &grant.refresh_token,
                grant.expiry,
            )
            .await?;

        tracing::info!(cnsi_guid = %cnsi_guid, user_guid = %user_guid, "connected to cnsi");
        Ok(record)
    }

    /// Same exchange as [`CnsiAuth::login`], but nothing is stored. Returns the
    /// identity the cluster issued the token for.
    pub async fn verify_login(
        &self,
        cnsi_guid: Uuid,
        username: &str,
        password: &str,
    ) -> Result<UserIdentity, AppError> {
        let (_, _, identity) = self.grant(cnsi_guid, username, password).await?;
        tracing::debug!(cnsi_guid = %cnsi_guid, "verified cnsi credentials");
        Ok(identity)
    }

    /// Every registered cluster paired with `user_guid`'s connection to it,
    /// if any.
    pub async fn connections(
        &self,
        user_guid: &str,
    ) -> Result<Vec<(CnsiRecord, Option<TokenRecord>)>, AppError> {
        let cnsis = self.cnsis.list_cnsis().await?;
        let mut out = Vec::with_capacity(cnsis.len());
        for cnsi in cnsis {
            let token = self.tokens.lookup(cnsi.guid, user_guid).await?;
            out.push((cnsi, token));
        }
        Ok(out)
    }

    async fn grant(
        &self,
        cnsi_guid: Uuid,
        username: &str,
        password: &str,
    ) -> Result<(CnsiRecord, TokenGrant, UserIdentity), AppError> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::Validation("username and password are required".into()));
        }

        let cnsi = self
            .cnsis
            .get_cnsi(cnsi_guid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cnsi {}", cnsi_guid)))?;

        let token_endpoint = self.clients.token_endpoint_for(&cnsi).ok_or_else(|| {
            AppError::Validation(format!("cnsi {} has no token endpoint", cnsi_guid))
        })?;

        let grant = self
            .oauth
            .password_grant(
                cnsi.skip_ssl_validation,
                username,
                password,
                self.clients.for_type(cnsi.cnsi_type),
                token_endpoint,
            )
            .await?;

        let identity = oauth::parse_claims(&grant.access_token)?;
        Ok((cnsi, grant, identity))
    }

    pub async fn logout(&self, cnsi_guid: Uuid, user_guid: &str) -> Result<(), AppError> {
        if !self.tokens.delete(cnsi_guid, user_guid).await? {
            return Err(AppError::NotFound(format!(
                "token for cnsi {} and user {}",
                cnsi_guid, user_guid
            )));
        }
        Ok(())
    }
}
