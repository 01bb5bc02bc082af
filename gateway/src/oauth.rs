//! OAuth2 exchanges against a cluster's token endpoint, and claim decoding
//! for the access tokens it issues.
//!
//! Tokens are decoded without signature verification: they come straight
//! from the issuer over a connection this service opened itself.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::cnsi::{CnsiRecord, CnsiType};
use crate::models::token::UserIdentity;
use crate::proxy::upstream::HttpClients;

/// Client identity used for grants against one flavor of cluster.
#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    /// Used when the cluster itself advertises no token endpoint.
    pub token_endpoint: Option<String>,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_endpoint", &self.token_endpoint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OAuthClients {
    pub hcf: OAuthClient,
    pub hce: OAuthClient,
}

impl OAuthClients {
    pub fn for_type(&self, cnsi_type: CnsiType) -> &OAuthClient {
        match cnsi_type {
            CnsiType::Hcf => &self.hcf,
            CnsiType::Hce => &self.hce,
        }
    }

    /// The token endpoint to use for a cluster: its discovered one, else the
    /// shared endpoint configured for its flavor.
    pub fn token_endpoint_for<'a>(&'a self, cnsi: &'a CnsiRecord) -> Option<&'a str> {
        if !cnsi.token_endpoint.is_empty() {
            return Some(cnsi.token_endpoint.as_str());
        }
        self.for_type(cnsi.cnsi_type)
            .token_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
    }
}

/// Result of a successful grant.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct JwtClaims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    scope: Option<ScopeClaim>,
    exp: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    List(Vec<String>),
    Delimited(String),
}

pub struct OAuthTokenService {
    clients: Arc<HttpClients>,
}

impl OAuthTokenService {
    pub fn new(clients: Arc<HttpClients>) -> Self {
        Self { clients }
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh(
        &self,
        skip_ssl_validation: bool,
        refresh_token: &str,
        client: &OAuthClient,
        token_endpoint: &str,
    ) -> Result<TokenGrant, AppError> {
        let grant = self
            .grant(
                skip_ssl_validation,
                client,
                token_endpoint,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;
        Ok(TokenGrant {
            access_token: grant.access_token,
            refresh_token: grant
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            expiry: grant.expiry,
        })
    }

    /// Exchanges user credentials for an initial token pair.
    pub async fn password_grant(
        &self,
        skip_ssl_validation: bool,
        username: &str,
        password: &str,
        client: &OAuthClient,
        token_endpoint: &str,
    ) -> Result<TokenGrant, AppError> {
        let grant = self
            .grant(
                skip_ssl_validation,
                client,
                token_endpoint,
                &[
                    ("grant_type", "password"),
                    ("username", username),
                    ("password", password),
                ],
            )
            .await?;
        let refresh_token = grant.refresh_token.ok_or_else(|| {
            AppError::AuthServer("password grant returned no refresh token".into())
        })?;
        Ok(TokenGrant {
            access_token: grant.access_token,
            refresh_token,
            expiry: grant.expiry,
        })
    }

    async fn grant(
        &self,
        skip_ssl_validation: bool,
        client: &OAuthClient,
        token_endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<PartialGrant, AppError> {
        let url = format!("{}/oauth/token", token_endpoint.trim_end_matches('/'));

        let resp = self
            .clients
            .for_policy(skip_ssl_validation)
            .post(&url)
            .basic_auth(&client.client_id, Some(&client.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(AppError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_default();
            tracing::warn!(status = %status, client_id = %client.client_id, "token endpoint rejected grant");
            return Err(AppError::AuthServer(format!("HTTP {} {}", status.as_u16(), detail).trim_end().to_string()));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::AuthServer(format!("token response parse error: {}", e.without_url())))?;

        let expiry = match body.expires_in {
            Some(secs) => Duration::try_seconds(secs)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| AppError::AuthServer(format!("invalid expires_in: {}", secs)))?,
            None => expiry_from_claims(&body.access_token)?,
        };

        Ok(PartialGrant {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expiry,
        })
    }
}

struct PartialGrant {
    access_token: String,
    refresh_token: Option<String>,
    expiry: DateTime<Utc>,
}

/// Decodes identity claims from an access token without verifying its signature.
pub fn parse_claims(access_token: &str) -> Result<UserIdentity, AppError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<JwtClaims>(
        access_token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|e| AppError::MalformedToken(e.to_string()))?;

    let claims = data.claims;
    let user_guid = claims
        .user_id
        .or(claims.sub)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::MalformedToken("missing user_id/sub claim".into()))?;

    let scopes = match claims.scope {
        Some(ScopeClaim::List(list)) => list,
        Some(ScopeClaim::Delimited(s)) => s.split_whitespace().map(String::from).collect(),
        None => Vec::new(),
    };

    Ok(UserIdentity {
        user_guid,
        user_name: claims.user_name,
        scopes,
        token_expiry: claims.exp,
    })
}

fn expiry_from_claims(access_token: &str) -> Result<DateTime<Utc>, AppError> {
    let identity = parse_claims(access_token)?;
    Utc.timestamp_opt(identity.token_expiry, 0)
        .single()
        .ok_or_else(|| AppError::MalformedToken("exp claim out of range".into()))
}
