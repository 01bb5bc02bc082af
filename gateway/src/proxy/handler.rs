use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use uuid::Uuid;

use crate::api::handlers::user_guid;
use crate::errors::AppError;
use crate::proxy::executor::ProxyRequest;
use crate::AppState;

pub const CNSI_GUID_HEADER: &str = "x-cnsi-guid";

/// Mount point of the proxy route; everything after it is the cluster path.
pub const PROXY_PREFIX: &str = "/v1/proxy";

/// Response headers that describe the cluster's connection, not the payload.
const HOP_HEADERS: &[&str] = &["connection", "content-length", "transfer-encoding", "keep-alive"];

/// ANY /v1/proxy/*path: forwards to the cluster named by `x-cnsi-guid`.
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let user_guid = user_guid(&headers)?;
    let cnsi_guid = headers
        .get(CNSI_GUID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation(format!("missing {} header", CNSI_GUID_HEADER)))
        .and_then(|v| {
            Uuid::parse_str(v.trim()).map_err(|_| {
                AppError::Validation(format!("{} is not a valid guid", CNSI_GUID_HEADER))
            })
        })?;

    let path = cluster_path(&uri);

    let upstream = state
        .executor
        .execute(ProxyRequest {
            cnsi_guid,
            user_guid,
            method,
            path,
            headers,
            body,
        })
        .await?;

    let mut response = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if !HOP_HEADERS.contains(&name.as_str()) {
            response = response.header(name, value);
        }
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("response build failed: {}", e)))
}

/// The cluster-relative target with the caller's percent-encoding intact.
fn cluster_path(uri: &Uri) -> String {
    let path = uri.path().strip_prefix(PROXY_PREFIX).unwrap_or(uri.path());
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    match uri.query() {
        Some(q) => format!("{}?{}", path, q),
        None => path,
    }
}
