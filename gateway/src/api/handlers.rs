use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::cnsi::{CnsiRecord, CnsiType};
use crate::models::token::UserIdentity;
use crate::AppState;

pub const USER_GUID_HEADER: &str = "x-user-guid";

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub cnsi_name: String,
    pub api_endpoint: String,
    #[serde(default)]
    pub skip_ssl_validation: bool,
}

#[derive(Deserialize)]
pub struct CnsiRef {
    pub cnsi_guid: Uuid,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub cnsi_guid: Uuid,
    pub username: String,
    pub password: String,
}

/// What a caller learns about a connection; never the tokens themselves.
#[derive(Serialize)]
pub struct ConnectedView {
    pub cnsi_guid: Uuid,
    pub user: UserIdentity,
    pub token_expiry: DateTime<Utc>,
}

/// A registered cluster as seen by one user: the record plus whether, and
/// as whom, they are connected.
#[derive(Serialize)]
pub struct RegisteredCnsiView {
    #[serde(flatten)]
    pub cnsi: CnsiRecord,
    pub connected: bool,
    pub token_expiry: Option<DateTime<Utc>>,
    pub user: Option<UserIdentity>,
}

#[derive(Serialize)]
pub struct VerifiedView {
    pub cnsi_guid: Uuid,
    pub user: UserIdentity,
}

/// Identity of the calling user, as resolved by the session layer.
pub fn user_guid(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_GUID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| AppError::Validation(format!("missing {} header", USER_GUID_HEADER)))
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /v1/register/hcf
pub async fn register_hcf(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CnsiRecord>), AppError> {
    register(&state, payload, CnsiType::Hcf).await
}

/// POST /v1/register/hce
pub async fn register_hce(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CnsiRecord>), AppError> {
    register(&state, payload, CnsiType::Hce).await
}

async fn register(
    state: &AppState,
    payload: RegisterRequest,
    cnsi_type: CnsiType,
) -> Result<(StatusCode, Json<CnsiRecord>), AppError> {
    let record = state
        .registry
        .register(
            &payload.cnsi_name,
            &payload.api_endpoint,
            payload.skip_ssl_validation,
            cnsi_type,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/cnsis
pub async fn list_cnsis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CnsiRecord>>, AppError> {
    Ok(Json(state.registry.list().await?))
}

/// GET /v1/cnsis/registered
pub async fn list_registered_cnsis(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<RegisteredCnsiView>>, AppError> {
    let user_guid = user_guid(&headers)?;
    let views = state
        .auth
        .connections(&user_guid)
        .await?
        .into_iter()
        .map(|(cnsi, token)| RegisteredCnsiView {
            cnsi,
            connected: token.is_some(),
            token_expiry: token.as_ref().map(|t| t.token_expiry),
            user: token.map(|t| t.identity),
        })
        .collect();
    Ok(Json(views))
}

/// POST /v1/unregister
pub async fn unregister(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CnsiRef>,
) -> Result<StatusCode, AppError> {
    state.registry.unregister(payload.cnsi_guid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/auth/login/cnsi
pub async fn login_cnsi(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ConnectedView>, AppError> {
    let user_guid = user_guid(&headers)?;
    let record = state
        .auth
        .login(
            payload.cnsi_guid,
            &user_guid,
            &payload.username,
            &payload.password,
        )
        .await?;

    Ok(Json(ConnectedView {
        cnsi_guid: record.cnsi_guid,
        user: record.identity,
        token_expiry: record.token_expiry,
    }))
}

/// POST /v1/auth/login/cnsi/verify
pub async fn verify_login_cnsi(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<VerifiedView>, AppError> {
    user_guid(&headers)?;
    let user = state
        .auth
        .verify_login(payload.cnsi_guid, &payload.username, &payload.password)
        .await?;
    Ok(Json(VerifiedView {
        cnsi_guid: payload.cnsi_guid,
        user,
    }))
}

/// POST /v1/auth/logout/cnsi
pub async fn logout_cnsi(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CnsiRef>,
) -> Result<StatusCode, AppError> {
    let user_guid = user_guid(&headers)?;
    state.auth.logout(payload.cnsi_guid, &user_guid).await?;
    Ok(StatusCode::NO_CONTENT)
}
