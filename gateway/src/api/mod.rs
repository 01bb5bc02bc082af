use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{any, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::proxy::handler::{proxy_handler, PROXY_PREFIX};
use crate::AppState;

pub mod handlers;

/// Build the gateway router. The session layer in front of it is expected to
/// authenticate the caller and set `x-user-guid`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/v1/register/hcf", post(handlers::register_hcf))
        .route("/v1/register/hce", post(handlers::register_hce))
        .route("/v1/unregister", post(handlers::unregister))
        .route("/v1/cnsis", get(handlers::list_cnsis))
        .route("/v1/cnsis/registered", get(handlers::list_registered_cnsis))
        .route("/v1/auth/login/cnsi", post(handlers::login_cnsi))
        .route("/v1/auth/login/cnsi/verify", post(handlers::verify_login_cnsi))
        .route("/v1/auth/logout/cnsi", post(handlers::logout_cnsi))
        .route(&format!("{}/*path", PROXY_PREFIX), any(proxy_handler))
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
