//! Authenticated proxying of one request to one cluster.
//!
//! Flow: resolve the cluster and the caller's token, refresh the token when
//! it has expired, send with it as a bearer credential, and on a first 401
//! force a refresh and send once more. A second 401 is a real denial.
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::cnsi::CnsiRecord;
use crate::models::token::TokenRecord;
use crate::oauth::{self, OAuthClient, OAuthClients, OAuthTokenService};
use crate::proxy::upstream::HttpClients;
use crate::store::CnsiStore;
use crate::tokens::TokenStore;

/// Request headers that belong to the caller's connection with this gateway.
const STRIPPED_HEADERS: &[&str] = &[
    "host",
    "authorization",
    "cookie",
    "connection",
    "content-length",
    "transfer-encoding",
    "x-cnsi-guid",
    "x-user-guid",
];

/// One outbound call on behalf of a user.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub cnsi_guid: Uuid,
    pub user_guid: String,
    pub method: Method,
    /// Relative to the cluster's api endpoint; may carry a query string.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct ProxyExecutor {
    cnsis: Arc<dyn CnsiStore>,
    tokens: Arc<TokenStore>,
    oauth: Arc<OAuthTokenService>,
    http: Arc<HttpClients>,
    clients: OAuthClients,
}

impl ProxyExecutor {
    pub fn new(
        cnsis: Arc<dyn CnsiStore>,
        tokens: Arc<TokenStore>,
        oauth: Arc<OAuthTokenService>,
        http: Arc<HttpClients>,
        clients: OAuthClients,
    ) -> Self {
        Self {
            cnsis,
            tokens,
            oauth,
            http,
            clients,
        }
    }

    #[tracing::instrument(skip_all, fields(cnsi_guid = %req.cnsi_guid, user_guid = %req.user_guid, method = %req.method))]
    pub async fn execute(&self, req: ProxyRequest) -> Result<Response, AppError> {
        let (cnsi, mut token) = self.resolve(&req).await?;
        let client = self.clients.for_type(cnsi.cnsi_type);
        let url = target_url(&cnsi.api_endpoint, &req.path);

        let mut got_401 = false;
        loop {
            if got_401 || token.is_expired(Utc::now()) {
                token = self.refresh(&cnsi, &token, client).await?;
            }

            let resp = self.send(&cnsi, &req, &url, &token.auth_token).await?;
            if resp.status() != StatusCode::UNAUTHORIZED {
                return Ok(resp);
            }

            if got_401 {
                tracing::warn!("refreshed token rejected by cluster");
                return Err(AppError::Authorization {
                    cnsi_guid: cnsi.guid,
                    user_guid: req.user_guid.clone(),
                });
            }
            tracing::debug!("cluster answered 401, retrying with a refreshed token");
            got_401 = true;
        }
    }

    async fn resolve(&self, req: &ProxyRequest) -> Result<(CnsiRecord, TokenRecord), AppError> {
        let cnsi = self
            .cnsis
            .get_cnsi(req.cnsi_guid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cnsi {}", req.cnsi_guid)))?;

        let token = self
            .tokens
            .lookup(req.cnsi_guid, &req.user_guid)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "token for cnsi {} and user {}",
                    req.cnsi_guid, req.user_guid
                ))
            })?;

        Ok((cnsi, token))
    }

    async fn refresh(
        &self,
        cnsi: &CnsiRecord,
        current: &TokenRecord,
        client: &OAuthClient,
    ) -> Result<TokenRecord, AppError> {
        let refresh_error = |reason: String| AppError::Refresh {
            cnsi_guid: cnsi.guid,
            user_guid: current.user_guid.clone(),
            reason,
        };

        let token_endpoint = self
            .clients
            .token_endpoint_for(cnsi)
            .ok_or_else(|| refresh_error("no token endpoint configured".into()))?;

        let grant = self
            .oauth
            .refresh(
                cnsi.skip_ssl_validation,
                &current.refresh_token,
                client,
                token_endpoint,
            )
            .await
            .map_err(|e| refresh_error(e.to_string()))?;

        let mut identity =
            oauth::parse_claims(&grant.access_token).map_err(|e| refresh_error(e.to_string()))?;
        // Tokens are keyed by the gateway user, not the cluster's id for them.
        identity.user_guid = current.user_guid.clone();

        let saved = self
            .tokens
            .save(
                cnsi.guid,
                &identity,
                &grant.access_token,
                &grant.refresh_token,
                grant.expiry,
            )
            .await
            .map_err(|e| refresh_error(e.to_string()))?;

        tracing::info!(expiry = %saved.token_expiry, "refreshed cnsi token");
        Ok(saved)
    }

    async fn send(
        &self,
        cnsi: &CnsiRecord,
        req: &ProxyRequest,
        url: &str,
        access_token: &str,
    ) -> Result<Response, AppError> {
        let mut headers = req.headers.clone();
        for name in STRIPPED_HEADERS {
            headers.remove(*name);
        }
        let bearer = HeaderValue::from_str(&format!("bearer {}", access_token))
            .map_err(|_| AppError::MalformedToken("access token is not a valid header value".into()))?;
        headers.insert(header::AUTHORIZATION, bearer);

        let resp = self
            .http
            .for_policy(cnsi.skip_ssl_validation)
            .request(req.method.clone(), url)
            .headers(headers)
            .body(req.body.clone())
            .send()
            .await
            .map_err(|e| {
                let e = AppError::transport(e);
                tracing::warn!("cluster request failed: {}", e);
                e
            })?;

        tracing::debug!(status = %resp.status(), "cluster responded");
        Ok(resp)
    }
}

fn target_url(api_endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        api_endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
